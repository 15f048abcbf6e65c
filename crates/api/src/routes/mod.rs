pub mod bom;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /bom                 list (?rootId&sortBy&sortDir&page&size), create
/// /bom/tree            nested forest (?rootId)
/// /bom/{id}            get, update, delete
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/bom", bom::router())
}
