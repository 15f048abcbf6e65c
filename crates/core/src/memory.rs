//! In-process [`HierarchyStore`] backed by an ordered map.
//!
//! All nodes live in one `BTreeMap` keyed by id (an arena); a single lock
//! makes every trait call atomic, which gives batch writes the same
//! all-or-nothing behaviour as a database transaction. Used by the core and
//! API test suites and by callers that embed the engine without PostgreSQL.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::node::{BomNode, NewBomNode};
use crate::path;
use crate::store::{HierarchyStore, SiblingScope, StoreError, StoreResult, WriteBatch};
use crate::types::{DbId, ProductId};

#[derive(Debug, Default)]
struct Inner {
    nodes: BTreeMap<DbId, BomNode>,
    last_id: DbId,
    sequences: HashMap<SiblingScope, i64>,
}

impl Inner {
    fn live(&self) -> impl Iterator<Item = &BomNode> {
        self.nodes.values().filter(|n| !n.is_deleted())
    }

    /// Whether a live node outside `except` already uses `path`.
    fn path_taken(&self, path: &str, except: &HashSet<DbId>) -> bool {
        self.live()
            .any(|n| n.path == path && !except.contains(&n.id))
    }

    /// Highest index any row in `scope` has ever used, tombstones included.
    fn highest_index(&self, scope: SiblingScope) -> i64 {
        self.nodes
            .values()
            .filter(|n| scope.contains(n))
            .filter_map(|n| path::sibling_index(&n.path))
            .max()
            .unwrap_or(0)
    }

    /// Check that `staged` still matches the stored row version.
    fn check_version(&self, staged: &BomNode) -> StoreResult<()> {
        match self.nodes.get(&staged.id) {
            Some(current) if current.is_deleted() => Err(StoreError::Conflict(format!(
                "BomNode {} was deleted concurrently",
                staged.id
            ))),
            Some(current) if current.version != staged.version => {
                Err(StoreError::Conflict(format!(
                    "BomNode {} was modified concurrently (version {} != {})",
                    staged.id, current.version, staged.version
                )))
            }
            Some(_) => Ok(()),
            None => Err(StoreError::Conflict(format!(
                "BomNode {} does not exist",
                staged.id
            ))),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryHierarchyStore {
    inner: RwLock<Inner>,
    unavailable: AtomicBool,
}

impl InMemoryHierarchyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`StoreError::Failure`], to
    /// exercise outage handling.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every row, tombstones included, ordered by id.
    pub async fn snapshot(&self) -> Vec<BomNode> {
        self.inner.read().await.nodes.values().cloned().collect()
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Failure("in-memory store marked unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl HierarchyStore for InMemoryHierarchyStore {
    async fn create(&self, node: NewBomNode) -> StoreResult<BomNode> {
        self.ensure_available()?;
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        if inner.path_taken(&node.path, &HashSet::new()) {
            return Err(StoreError::Conflict(format!(
                "Path {} is already used by a live node",
                node.path
            )));
        }
        if let Some(parent_id) = node.parent_id {
            let expected = path::parent_prefix(&node.path);
            let parent = inner
                .nodes
                .get_mut(&parent_id)
                .filter(|p| !p.is_deleted() && Some(p.path.as_str()) == expected)
                .ok_or_else(|| {
                    StoreError::Conflict(format!(
                        "Parent BomNode {parent_id} was moved or deleted concurrently"
                    ))
                })?;
            parent.version += 1;
        }
        inner.last_id += 1;
        let created = BomNode {
            id: inner.last_id,
            root_product_id: node.root_product_id,
            product_id: node.product_id,
            parent_id: node.parent_id,
            path: node.path,
            quantity_of_prod: node.quantity_of_prod,
            material_id: node.material_id,
            quantity_of_materials: node.quantity_of_materials,
            tile_hh: node.tile_hh,
            application_date: node.application_date,
            end_date: node.end_date,
            tk_vat_tu: node.tk_vat_tu,
            tkh: node.tkh,
            version: 1,
            updated_by: node.created_by.clone(),
            created_by: node.created_by,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        inner.nodes.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<BomNode>> {
        self.ensure_available()?;
        Ok(self.inner.read().await.nodes.get(&id).cloned())
    }

    async fn find_by_root_id(&self, root_product_id: ProductId) -> StoreResult<Vec<BomNode>> {
        self.ensure_available()?;
        let inner = self.inner.read().await;
        Ok(inner
            .live()
            .filter(|n| n.root_product_id == root_product_id)
            .cloned()
            .collect())
    }

    async fn find_all(&self) -> StoreResult<Vec<BomNode>> {
        self.ensure_available()?;
        Ok(self.inner.read().await.live().cloned().collect())
    }

    async fn find_by_path_prefix(&self, prefix: &str) -> StoreResult<Vec<BomNode>> {
        self.ensure_available()?;
        let inner = self.inner.read().await;
        let mut found: Vec<BomNode> = inner
            .live()
            .filter(|n| n.path.starts_with(prefix))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }

    async fn count_where(
        &self,
        root_product_id: ProductId,
        parent_id: Option<DbId>,
    ) -> StoreResult<i64> {
        self.ensure_available()?;
        let inner = self.inner.read().await;
        let count = inner
            .live()
            .filter(|n| n.root_product_id == root_product_id && n.parent_id == parent_id)
            .count();
        Ok(count as i64)
    }

    async fn next_sibling_index(
        &self,
        root_product_id: ProductId,
        parent_id: Option<DbId>,
    ) -> StoreResult<i64> {
        self.ensure_available()?;
        let mut inner = self.inner.write().await;
        let scope = SiblingScope::of(root_product_id, parent_id);
        let seed = match inner.sequences.get(&scope) {
            Some(_) => 0,
            None => inner.highest_index(scope),
        };
        let counter = inner.sequences.entry(scope).or_insert(seed);
        *counter += 1;
        Ok(*counter)
    }

    async fn update(&self, node: BomNode) -> StoreResult<BomNode> {
        let mut updated = self.batch_update(vec![node].into()).await?;
        updated
            .pop()
            .ok_or_else(|| StoreError::Failure("update returned no row".into()))
    }

    async fn batch_update(&self, batch: WriteBatch) -> StoreResult<Vec<BomNode>> {
        self.ensure_available()?;
        let mut inner = self.inner.write().await;
        let WriteBatch { updates, touches } = batch;

        // Validate the whole batch before touching anything.
        let ids: HashSet<DbId> = updates.iter().map(|n| n.id).collect();
        let touched: HashSet<DbId> = touches.iter().map(|n| n.id).collect();
        if ids.len() != updates.len()
            || touched.len() != touches.len()
            || !ids.is_disjoint(&touched)
        {
            return Err(StoreError::Failure("batch contains duplicate ids".into()));
        }
        for staged in &touches {
            inner.check_version(staged)?;
        }
        let mut staged_paths = HashSet::new();
        for staged in &updates {
            inner.check_version(staged)?;
            if !staged_paths.insert(staged.path.as_str()) || inner.path_taken(&staged.path, &ids) {
                return Err(StoreError::Conflict(format!(
                    "Path {} is already used by a live node",
                    staged.path
                )));
            }
        }

        for id in &touched {
            if let Some(node) = inner.nodes.get_mut(id) {
                node.version += 1;
            }
        }
        let now = Utc::now();
        let mut committed = Vec::with_capacity(updates.len());
        for mut staged in updates {
            staged.version += 1;
            staged.updated_at = now;
            inner.nodes.insert(staged.id, staged.clone());
            committed.push(staged);
        }
        Ok(committed)
    }

    async fn soft_delete(&self, id: DbId) -> StoreResult<()> {
        self.ensure_available()?;
        let mut inner = self.inner.write().await;
        if let Some(node) = inner.nodes.get_mut(&id).filter(|n| !n.is_deleted()) {
            node.deleted_at = Some(Utc::now());
            node.version += 1;
        }
        Ok(())
    }

    async fn soft_delete_batch(&self, nodes: Vec<BomNode>) -> StoreResult<u64> {
        self.ensure_available()?;
        let mut inner = self.inner.write().await;
        for staged in &nodes {
            inner.check_version(staged)?;
        }

        let now = Utc::now();
        for staged in &nodes {
            if let Some(node) = inner.nodes.get_mut(&staged.id) {
                node.deleted_at = Some(now);
                node.version += 1;
            }
        }
        Ok(nodes.len() as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.ensure_available()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
