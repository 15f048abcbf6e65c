//! Persistence contract the hierarchy engine depends on.
//!
//! Implemented by `bomtree_db::PgHierarchyStore` for PostgreSQL and by
//! [`crate::memory::InMemoryHierarchyStore`] for tests and embedding.
//!
//! Every read excludes tombstoned rows unless stated otherwise. Writes that
//! take existing nodes check the `version` the caller read and bump it, so a
//! concurrent writer surfaces as [`StoreError::Conflict`] instead of being
//! silently overwritten.

use async_trait::async_trait;

use crate::node::{BomNode, NewBomNode};
use crate::types::{DbId, ProductId};

/// Errors a [`HierarchyStore`] may return.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The data changed underneath the caller (version mismatch, uniqueness
    /// backstop, serialization failure). Retryable.
    #[error("{0}")]
    Conflict(String),

    /// The backend failed (connectivity, aborted transaction, bad data).
    #[error("{0}")]
    Failure(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Owner of a sibling counter.
///
/// Children are counted per parent row, so the counter travels with the
/// parent when it moves to another root. Top-level nodes are counted per root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiblingScope {
    TopLevel(ProductId),
    Children(DbId),
}

impl SiblingScope {
    pub fn of(root_product_id: ProductId, parent_id: Option<DbId>) -> Self {
        match parent_id {
            Some(parent_id) => Self::Children(parent_id),
            None => Self::TopLevel(root_product_id),
        }
    }

    /// Whether `node` (live or tombstoned) is numbered by this counter.
    pub fn contains(&self, node: &BomNode) -> bool {
        match *self {
            Self::TopLevel(root) => node.parent_id.is_none() && node.root_product_id == root,
            Self::Children(parent_id) => node.parent_id == Some(parent_id),
        }
    }
}

/// Rows one [`HierarchyStore::batch_update`] writes atomically.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    /// Persisted in full. Version-checked, `updated_at` refreshed.
    pub updates: Vec<BomNode>,
    /// Version-checked and version-bumped only. Data and `updated_at` stay.
    pub touches: Vec<BomNode>,
}

impl WriteBatch {
    pub fn touching(mut self, node: BomNode) -> Self {
        self.touches.push(node);
        self
    }
}

impl From<Vec<BomNode>> for WriteBatch {
    fn from(updates: Vec<BomNode>) -> Self {
        Self {
            updates,
            touches: Vec::new(),
        }
    }
}

#[async_trait]
pub trait HierarchyStore: Send + Sync {
    /// Insert a new node and return it with its assigned id.
    ///
    /// When `node.parent_id` is set, the store must atomically verify that the
    /// parent is live and that its path equals the parent prefix of
    /// `node.path`, and bump the parent's version; otherwise `Conflict`.
    async fn create(&self, node: NewBomNode) -> StoreResult<BomNode>;

    /// Find a node by id, including tombstoned ones.
    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<BomNode>>;

    /// All live nodes of one root product, ordered by id.
    async fn find_by_root_id(&self, root_product_id: ProductId) -> StoreResult<Vec<BomNode>>;

    /// All live nodes, ordered by id.
    async fn find_all(&self) -> StoreResult<Vec<BomNode>>;

    /// All live nodes whose path starts with `prefix`, ordered by path.
    async fn find_by_path_prefix(&self, prefix: &str) -> StoreResult<Vec<BomNode>>;

    /// Number of live nodes under `(root_product_id, parent_id)`.
    async fn count_where(
        &self,
        root_product_id: ProductId,
        parent_id: Option<DbId>,
    ) -> StoreResult<i64>;

    /// Atomically increment and return the counter of
    /// `SiblingScope::of(root_product_id, parent_id)`. A fresh counter starts
    /// after the highest index already used in its scope (tombstones
    /// included). Values are never handed out twice.
    async fn next_sibling_index(
        &self,
        root_product_id: ProductId,
        parent_id: Option<DbId>,
    ) -> StoreResult<i64>;

    /// Persist one node (version-checked).
    async fn update(&self, node: BomNode) -> StoreResult<BomNode>;

    /// Apply a [`WriteBatch`] as one atomic unit. Either every row commits or
    /// none does. Returns the rows of `batch.updates` as persisted.
    async fn batch_update(&self, batch: WriteBatch) -> StoreResult<Vec<BomNode>>;

    /// Tombstone one node. Absent or already deleted ids are a no-op.
    async fn soft_delete(&self, id: DbId) -> StoreResult<()>;

    /// Tombstone all given nodes as one atomic unit (each version-checked).
    /// Returns how many rows were tombstoned.
    async fn soft_delete_batch(&self, nodes: Vec<BomNode>) -> StoreResult<u64>;

    /// Cheap liveness check used by `/health`.
    async fn ping(&self) -> StoreResult<()>;
}
