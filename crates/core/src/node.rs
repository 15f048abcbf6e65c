//! BOM node entity, input DTOs, and the views returned to callers.
//!
//! Nodes live in one flat collection; the hierarchy is expressed only through
//! `parent_id` references and the materialized `path`. Trees are transient
//! views built by [`crate::tree`].

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{Date, DbId, ProductId, Timestamp};

/// Actor name reported when a row carries no audit actor.
pub const DEFAULT_ACTOR: &str = "system";

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// One line of a bill of materials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomNode {
    pub id: DbId,
    pub root_product_id: ProductId,
    pub product_id: Option<ProductId>,
    pub parent_id: Option<DbId>,
    /// `"{root}/{i1}/{i2}/..."`; see [`crate::path`].
    pub path: String,
    pub quantity_of_prod: i32,
    pub material_id: String,
    pub quantity_of_materials: i32,
    /// Loss/scrap ratio, stored verbatim.
    pub tile_hh: Option<String>,
    pub application_date: Option<Date>,
    pub end_date: Option<Date>,
    pub tk_vat_tu: Option<String>,
    pub tkh: Option<String>,
    /// Optimistic concurrency counter, bumped by every write to the row.
    pub version: i64,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl BomNode {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A fully resolved node ready to be inserted. The store assigns `id`,
/// `version` and the timestamps.
#[derive(Debug, Clone)]
pub struct NewBomNode {
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
    pub created_by: Option<String>,
}

impl NewBomNode {
    /// Combine caller input with the generated path and audit actor.
    pub fn from_input(input: CreateBomNode, path: String, actor: &str) -> Self {
        Self {
            root_product_id: input.root_product_id,
            product_id: input.product_id,
            parent_id: input.parent_id,
            path,
            quantity_of_prod: input.quantity_of_prod,
            material_id: input.material_id,
            quantity_of_materials: input.quantity_of_materials,
            tile_hh: input.tile_hh,
            application_date: input.application_date,
            end_date: input.end_date,
            tk_vat_tu: input.tk_vat_tu,
            tkh: input.tkh,
            created_by: Some(actor.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// Input for creating a BOM node. Field-level validation is the caller's job.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBomNode {
    pub root_product_id: ProductId,
    #[serde(default)]
    pub parent_id: Option<DbId>,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    pub quantity_of_prod: i32,
    pub material_id: String,
    pub quantity_of_materials: i32,
    #[serde(default, rename = "tileHH")]
    pub tile_hh: Option<String>,
    #[serde(default)]
    pub application_date: Option<Date>,
    #[serde(default)]
    pub end_date: Option<Date>,
    #[serde(default)]
    pub tk_vat_tu: Option<String>,
    #[serde(default)]
    pub tkh: Option<String>,
}

// ---------------------------------------------------------------------------
// Update DTO
// ---------------------------------------------------------------------------

/// Partial update. `parent_id` is tri-state: absent (`None`), explicit
/// `null` (`Some(None)`, move to top level) or a value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBomNode {
    pub root_product_id: Option<ProductId>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub parent_id: Option<Option<DbId>>,
    pub product_id: Option<ProductId>,
    pub quantity_of_prod: Option<i32>,
    pub material_id: Option<String>,
    pub quantity_of_materials: Option<i32>,
    #[serde(rename = "tileHH")]
    pub tile_hh: Option<String>,
    pub application_date: Option<Date>,
    pub end_date: Option<Date>,
    pub tk_vat_tu: Option<String>,
    pub tkh: Option<String>,
}

/// Where a structural edit wants to put a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveTarget {
    pub root_product_id: ProductId,
    pub parent_id: Option<DbId>,
}

impl UpdateBomNode {
    /// The requested placement, or `None` when root and parent stay as they are.
    pub fn move_target(&self, node: &BomNode) -> Option<MoveTarget> {
        let target = MoveTarget {
            root_product_id: self.root_product_id.unwrap_or(node.root_product_id),
            parent_id: self.parent_id.unwrap_or(node.parent_id),
        };
        let unchanged =
            target.root_product_id == node.root_product_id && target.parent_id == node.parent_id;
        (!unchanged).then_some(target)
    }

    /// Copy the non-structural fields that are present onto `node`.
    pub fn apply_fields(&self, node: &mut BomNode) {
        if let Some(product_id) = self.product_id {
            node.product_id = Some(product_id);
        }
        if let Some(qty) = self.quantity_of_prod {
            node.quantity_of_prod = qty;
        }
        if let Some(ref material_id) = self.material_id {
            node.material_id = material_id.clone();
        }
        if let Some(qty) = self.quantity_of_materials {
            node.quantity_of_materials = qty;
        }
        if let Some(ref tile_hh) = self.tile_hh {
            node.tile_hh = Some(tile_hh.clone());
        }
        if let Some(date) = self.application_date {
            node.application_date = Some(date);
        }
        if let Some(date) = self.end_date {
            node.end_date = Some(date);
        }
        if let Some(ref tk_vat_tu) = self.tk_vat_tu {
            node.tk_vat_tu = Some(tk_vat_tu.clone());
        }
        if let Some(ref tkh) = self.tkh {
            node.tkh = Some(tkh.clone());
        }
    }
}

/// Distinguish an explicit `null` from an absent field.
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Flat representation of a node returned by create/update/find operations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub id: DbId,
    pub root_product_id: ProductId,
    pub parent_id: Option<DbId>,
    pub product_id: ProductId,
    pub path: String,
    pub quantity_of_prod: i32,
    pub material_id: String,
    pub quantity_of_materials: i32,
    #[serde(rename = "tileHH")]
    pub tile_hh: String,
    pub application_date: String,
    pub end_date: String,
    pub tk_vat_tu: String,
    pub tkh: String,
    pub created_date: String,
    pub last_modified_date: String,
    pub created_by: String,
    pub modified_by: String,
}

impl From<&BomNode> for NodeView {
    fn from(node: &BomNode) -> Self {
        Self {
            id: node.id,
            root_product_id: node.root_product_id,
            parent_id: node.parent_id,
            product_id: node.product_id.unwrap_or(0),
            path: node.path.clone(),
            quantity_of_prod: node.quantity_of_prod,
            material_id: node.material_id.clone(),
            quantity_of_materials: node.quantity_of_materials,
            tile_hh: node.tile_hh.clone().unwrap_or_default(),
            application_date: format_date(node.application_date),
            end_date: format_date(node.end_date),
            tk_vat_tu: node.tk_vat_tu.clone().unwrap_or_default(),
            tkh: node.tkh.clone().unwrap_or_default(),
            created_date: node.created_at.to_rfc3339(),
            last_modified_date: node.updated_at.to_rfc3339(),
            created_by: node
                .created_by
                .clone()
                .unwrap_or_else(|| DEFAULT_ACTOR.to_string()),
            modified_by: node
                .updated_by
                .clone()
                .unwrap_or_else(|| DEFAULT_ACTOR.to_string()),
        }
    }
}

/// A node with its nested children, as produced by [`crate::tree`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNodeView {
    pub id: DbId,
    pub product_id: ProductId,
    pub path: String,
    pub quantity_of_prod: i32,
    pub material_id: String,
    pub quantity_of_materials: i32,
    pub children: Vec<TreeNodeView>,
}

impl TreeNodeView {
    pub fn leaf(node: &BomNode) -> Self {
        Self {
            id: node.id,
            product_id: node.product_id.unwrap_or(0),
            path: node.path.clone(),
            quantity_of_prod: node.quantity_of_prod,
            material_id: node.material_id.clone(),
            quantity_of_materials: node.quantity_of_materials,
            children: Vec::new(),
        }
    }
}

fn format_date(date: Option<Date>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    /// A live node with the given placement and otherwise neutral fields.
    pub(crate) fn node(id: DbId, root: ProductId, parent: Option<DbId>, path: &str) -> BomNode {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(id);
        BomNode {
            id,
            root_product_id: root,
            product_id: None,
            parent_id: parent,
            path: path.to_string(),
            quantity_of_prod: 1,
            material_id: format!("MAT-{id}"),
            quantity_of_materials: 1,
            tile_hh: None,
            application_date: None,
            end_date: None,
            tk_vat_tu: None,
            tkh: None,
            version: 1,
            created_by: None,
            updated_by: None,
            created_at: ts,
            updated_at: ts,
            deleted_at: None,
        }
    }

    // -- UpdateBomNode -------------------------------------------------------

    #[test]
    fn absent_parent_is_not_a_move() {
        let current = node(3, 5, Some(1), "5/1/1");
        let update: UpdateBomNode = serde_json::from_value(json!({ "quantityOfProd": 4 })).unwrap();
        assert_eq!(update.parent_id, None);
        assert_eq!(update.move_target(&current), None);
    }

    #[test]
    fn explicit_null_parent_moves_to_top_level() {
        let current = node(3, 5, Some(1), "5/1/1");
        let update: UpdateBomNode = serde_json::from_value(json!({ "parentId": null })).unwrap();
        assert_eq!(update.parent_id, Some(None));
        assert_eq!(
            update.move_target(&current),
            Some(MoveTarget {
                root_product_id: 5,
                parent_id: None
            })
        );
    }

    #[test]
    fn same_parent_and_root_is_not_a_move() {
        let current = node(3, 5, Some(1), "5/1/1");
        let update: UpdateBomNode =
            serde_json::from_value(json!({ "parentId": 1, "rootProductId": 5 })).unwrap();
        assert_eq!(update.move_target(&current), None);
    }

    #[test]
    fn root_change_keeps_current_parent_when_absent() {
        let current = node(3, 5, Some(1), "5/1/1");
        let update: UpdateBomNode =
            serde_json::from_value(json!({ "rootProductId": 9 })).unwrap();
        assert_eq!(
            update.move_target(&current),
            Some(MoveTarget {
                root_product_id: 9,
                parent_id: Some(1)
            })
        );
    }

    #[test]
    fn apply_fields_only_touches_present_values() {
        let mut current = node(3, 5, Some(1), "5/1/1");
        current.tkh = Some("331".into());
        let update: UpdateBomNode = serde_json::from_value(json!({
            "materialId": "STEEL-02",
            "tileHH": "0.05"
        }))
        .unwrap();
        update.apply_fields(&mut current);
        assert_eq!(current.material_id, "STEEL-02");
        assert_eq!(current.tile_hh.as_deref(), Some("0.05"));
        assert_eq!(current.tkh.as_deref(), Some("331"));
        assert_eq!(current.quantity_of_prod, 1);
    }

    // -- Views ---------------------------------------------------------------

    #[test]
    fn node_view_applies_display_defaults() {
        let mut current = node(7, 5, None, "5/2");
        current.application_date = Some(Date::from_ymd_opt(2026, 3, 9).unwrap());
        let view = NodeView::from(&current);
        assert_eq!(view.product_id, 0);
        assert_eq!(view.tile_hh, "");
        assert_eq!(view.application_date, "2026-03-09");
        assert_eq!(view.end_date, "");
        assert_eq!(view.created_by, DEFAULT_ACTOR);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["tileHH"], "");
        assert_eq!(json["rootProductId"], 5);
        assert_eq!(json["lastModifiedDate"], view.last_modified_date);
    }

    #[test]
    fn create_input_reads_camel_case() {
        let input: CreateBomNode = serde_json::from_value(json!({
            "rootProductId": 5,
            "quantityOfProd": 2,
            "materialId": "BOLT-M6",
            "quantityOfMaterials": 12,
            "tileHH": "0.1",
            "endDate": "2027-01-31"
        }))
        .unwrap();
        assert_eq!(input.root_product_id, 5);
        assert_eq!(input.parent_id, None);
        assert_eq!(input.tile_hh.as_deref(), Some("0.1"));
        assert_eq!(input.end_date, Date::from_ymd_opt(2027, 1, 31));
    }
}
