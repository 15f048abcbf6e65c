//! Query parameter types for API handlers that are not owned by the core.

use serde::Deserialize;

use bomtree_core::types::ProductId;

/// Query parameters for `GET /bom/tree`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeParams {
    pub root_id: Option<ProductId>,
}
