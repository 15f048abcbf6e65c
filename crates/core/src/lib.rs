//! Bill-of-materials hierarchy engine.
//!
//! Nodes are stored flat and linked by `parent_id`; each carries a
//! materialized path (`"{root}/{i1}/{i2}/..."`) that makes descendant lookups
//! a prefix match. This crate owns path generation, the cascading path
//! rewrite on reparent, tree reconstruction and list queries. Persistence is
//! reached only through the [`store::HierarchyStore`] trait.

pub mod cascade;
pub mod error;
pub mod memory;
pub mod node;
pub mod path;
pub mod query;
pub mod service;
pub mod store;
pub mod tree;
pub mod types;
