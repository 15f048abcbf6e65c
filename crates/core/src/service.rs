//! BOM hierarchy operations exposed to the API layer.
//!
//! [`BomService`] turns validated input into store calls: create goes through
//! the path generator, structural updates through [`MoveCascade`], reads
//! through the query engine or tree builder. Each operation re-reads what it
//! needs; nothing is cached between calls.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::cascade::MoveCascade;
use crate::error::CoreError;
use crate::node::{BomNode, CreateBomNode, NewBomNode, NodeView, TreeNodeView, UpdateBomNode};
use crate::path::{self, PathGenerator, SiblingIndexing};
use crate::query::{self, FilterConfig, ListQuery};
use crate::store::HierarchyStore;
use crate::tree;
use crate::types::{DbId, ProductId};

const ENTITY: &str = "BomNode";

/// Paginated list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeListView {
    pub results: Vec<NodeView>,
    pub page_size: i64,
    pub sort_by: String,
    pub is_last_item: bool,
    pub total_page: i64,
    pub total_element: i64,
    pub filter_config: FilterConfig,
}

#[derive(Clone)]
pub struct BomService {
    store: Arc<dyn HierarchyStore>,
    paths: PathGenerator,
}

impl BomService {
    pub fn new(store: Arc<dyn HierarchyStore>, indexing: SiblingIndexing) -> Self {
        Self {
            store,
            paths: PathGenerator::new(indexing),
        }
    }

    pub fn store(&self) -> &dyn HierarchyStore {
        self.store.as_ref()
    }

    /// Create a node with a freshly generated path.
    pub async fn create(&self, input: CreateBomNode, actor: &str) -> Result<NodeView, CoreError> {
        let root = input.root_product_id;
        let path = self
            .paths
            .generate_path(self.store(), root, input.parent_id)
            .await?;
        let created = self
            .store
            .create(NewBomNode::from_input(input, path, actor))
            .await?;

        info!(
            id = created.id,
            root_product_id = root,
            path = %created.path,
            "BomNode created"
        );
        Ok(NodeView::from(&created))
    }

    /// Apply a partial update; reparents (with cascade) when the requested
    /// parent or root differs from the current one.
    pub async fn update(
        &self,
        id: DbId,
        input: UpdateBomNode,
        actor: &str,
    ) -> Result<NodeView, CoreError> {
        let mut node = self.live_node(id).await?;
        input.apply_fields(&mut node);
        node.updated_by = Some(actor.to_string());

        let updated = match input.move_target(&node) {
            Some(target) => {
                MoveCascade::new(self.store(), self.paths)
                    .execute(node, target, actor)
                    .await?
                    .node
            }
            None => self.store.update(node).await?,
        };
        debug!(id, path = %updated.path, "BomNode updated");
        Ok(NodeView::from(&updated))
    }

    /// Tombstone a node and its live descendants. Unknown or already deleted
    /// ids are ignored.
    pub async fn remove(&self, id: DbId) -> Result<(), CoreError> {
        let Some(node) = self.store.find_by_id(id).await?.filter(|n| !n.is_deleted()) else {
            debug!(id, "Remove of absent BomNode ignored");
            return Ok(());
        };
        let mut subtree = self
            .store
            .find_by_path_prefix(&path::descendant_prefix(&node.path))
            .await?;
        subtree.retain(|n| n.id != node.id);
        subtree.insert(0, node);

        let tombstoned = self.store.soft_delete_batch(subtree).await?;
        info!(id, tombstoned, "BomNode removed");
        Ok(())
    }

    pub async fn find_one(&self, id: DbId) -> Result<NodeView, CoreError> {
        self.live_node(id).await.map(|n| NodeView::from(&n))
    }

    /// Filtered, sorted, paginated list of live nodes.
    pub async fn find_all(&self, query: ListQuery) -> Result<NodeListView, CoreError> {
        let spec = query.validate()?;
        let nodes = match spec.root_id {
            Some(root) => self.store.find_by_root_id(root).await?,
            None => self.store.find_all().await?,
        };
        let page = query::list(nodes, &spec);
        debug!(
            total = page.total,
            page = spec.page,
            returned = page.results.len(),
            "Listed BomNodes"
        );

        Ok(NodeListView {
            results: page.results.iter().map(NodeView::from).collect(),
            page_size: spec.size,
            sort_by: spec.sort_key,
            is_last_item: page.is_last_item,
            total_page: page.total_pages,
            total_element: page.total,
            filter_config: FilterConfig::bom(),
        })
    }

    /// Forest of one root product, or of every root when `root_id` is `None`.
    pub async fn build_tree(
        &self,
        root_id: Option<ProductId>,
    ) -> Result<Vec<TreeNodeView>, CoreError> {
        let nodes = match root_id {
            Some(root) => self.store.find_by_root_id(root).await?,
            None => self.store.find_all().await?,
        };
        let forest = tree::build_forest(&nodes);
        debug!(
            ?root_id,
            nodes = nodes.len(),
            roots = forest.len(),
            "Built BOM forest"
        );
        Ok(forest)
    }

    async fn live_node(&self, id: DbId) -> Result<BomNode, CoreError> {
        self.store
            .find_by_id(id)
            .await?
            .filter(|n| !n.is_deleted())
            .ok_or(CoreError::NotFound { entity: ENTITY, id })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
