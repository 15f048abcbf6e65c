use std::sync::Arc;

use bomtree_core::service::BomService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: both fields are behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// BOM hierarchy operations over the configured store.
    pub bom: Arc<BomService>,
    /// Server configuration (audit actor, timeouts).
    pub config: Arc<ServerConfig>,
}
