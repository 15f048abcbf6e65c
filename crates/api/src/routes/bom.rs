//! Route definitions for BOM nodes.
//!
//! ```text
//! GET    /              list_nodes
//! POST   /              create_node
//! GET    /tree          get_tree
//! GET    /{id}          get_node
//! PUT    /{id}          update_node
//! DELETE /{id}          delete_node
//! ```

use axum::routing::get;
use axum::Router;

use crate::handlers::bom;
use crate::state::AppState;

/// BOM routes, mounted at `/bom`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(bom::list_nodes).post(bom::create_node))
        // Static segment must come before `/{id}`.
        .route("/tree", get(bom::get_tree))
        .route(
            "/{id}",
            get(bom::get_node)
                .put(bom::update_node)
                .delete(bom::delete_node),
        )
}
