//! Row struct for the `bom_nodes` table.

use bomtree_core::node::BomNode;
use bomtree_core::types::{Date, DbId, ProductId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `bom_nodes` table, tombstones included.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BomNodeRow {
    pub id: DbId,
    pub root_product_id: ProductId,
    pub product_id: Option<ProductId>,
    pub parent_id: Option<DbId>,
    pub path: String,
    pub quantity_of_prod: i32,
    pub material_id: String,
    pub quantity_of_materials: i32,
    pub tile_hh: Option<String>,
    pub application_date: Option<Date>,
    pub end_date: Option<Date>,
    pub tk_vat_tu: Option<String>,
    pub tkh: Option<String>,
    pub version: i64,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl From<BomNodeRow> for BomNode {
    fn from(row: BomNodeRow) -> Self {
        BomNode {
            id: row.id,
            root_product_id: row.root_product_id,
            product_id: row.product_id,
            parent_id: row.parent_id,
            path: row.path,
            quantity_of_prod: row.quantity_of_prod,
            material_id: row.material_id,
            quantity_of_materials: row.quantity_of_materials,
            tile_hh: row.tile_hh,
            application_date: row.application_date,
            end_date: row.end_date,
            tk_vat_tu: row.tk_vat_tu,
            tkh: row.tkh,
            version: row.version,
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}
