//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods.
//! Reads accept `&PgPool`; writes that must share a transaction accept a
//! `&mut PgConnection`.

pub mod bom_node_repo;

pub use bom_node_repo::BomNodeRepo;
