//! Handlers for BOM nodes.
//!
//! Each handler decodes the request, delegates to [`BomService`] and wraps
//! the result in the `{ "data": ... }` envelope. Audit fields are stamped
//! with the configured actor.
//!
//! [`BomService`]: bomtree_core::service::BomService

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use bomtree_core::node::{CreateBomNode, UpdateBomNode};
use bomtree_core::query::ListQuery;
use bomtree_core::types::DbId;

use crate::error::AppResult;
use crate::query::TreeParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /bom
// ---------------------------------------------------------------------------

/// Paginated list of live nodes.
pub async fn list_nodes(
    State(state): State<AppState>,
    params: Result<Query<ListQuery>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let Query(params) = params?;
    let list = state.bom.find_all(params).await?;
    Ok(Json(DataResponse { data: list }))
}

// ---------------------------------------------------------------------------
// POST /bom
// ---------------------------------------------------------------------------

/// Create a node; its path is generated from the parent and sibling index.
pub async fn create_node(
    State(state): State<AppState>,
    body: Result<Json<CreateBomNode>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(body) = body?;
    let node = state.bom.create(body, &state.config.audit_actor).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: node })))
}

// ---------------------------------------------------------------------------
// GET /bom/tree
// ---------------------------------------------------------------------------

/// Nested forest for one root product, or for all of them.
pub async fn get_tree(
    State(state): State<AppState>,
    params: Result<Query<TreeParams>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let Query(params) = params?;
    let forest = state.bom.build_tree(params.root_id).await?;
    Ok(Json(DataResponse { data: forest }))
}

// ---------------------------------------------------------------------------
// GET /bom/{id}
// ---------------------------------------------------------------------------

pub async fn get_node(
    State(state): State<AppState>,
    id: Result<Path<DbId>, PathRejection>,
) -> AppResult<impl IntoResponse> {
    let Path(id) = id?;
    let node = state.bom.find_one(id).await?;
    Ok(Json(DataResponse { data: node }))
}

// ---------------------------------------------------------------------------
// PUT /bom/{id}
// ---------------------------------------------------------------------------

/// Partial update. Changing `parentId` or `rootProductId` moves the node and
/// rewrites the paths of its whole subtree.
pub async fn update_node(
    State(state): State<AppState>,
    id: Result<Path<DbId>, PathRejection>,
    body: Result<Json<UpdateBomNode>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Path(id) = id?;
    let Json(body) = body?;
    let node = state
        .bom
        .update(id, body, &state.config.audit_actor)
        .await?;
    Ok(Json(DataResponse { data: node }))
}

// ---------------------------------------------------------------------------
// DELETE /bom/{id}
// ---------------------------------------------------------------------------

/// Soft-delete a node and its subtree. Unknown ids still return 204.
pub async fn delete_node(
    State(state): State<AppState>,
    id: Result<Path<DbId>, PathRejection>,
) -> AppResult<StatusCode> {
    let Path(id) = id?;
    state.bom.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
