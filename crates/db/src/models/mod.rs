//! Row types mapped with `sqlx::FromRow`.

pub mod bom_node;
