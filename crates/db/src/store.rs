//! PostgreSQL implementation of [`HierarchyStore`].
//!
//! Multi-row writes run inside one transaction. Rows are written in id order
//! so two concurrent batches touching overlapping rows lock them in the same
//! order.

use async_trait::async_trait;

use bomtree_core::node::{BomNode, NewBomNode};
use bomtree_core::path;
use bomtree_core::store::{HierarchyStore, SiblingScope, StoreError, StoreResult, WriteBatch};
use bomtree_core::types::{DbId, ProductId};

use crate::repositories::BomNodeRepo;
use crate::DbPool;

/// SQLSTATE codes that mean "retry": unique violation, serialization
/// failure, deadlock.
const RETRYABLE_CODES: [&str; 3] = ["23505", "40001", "40P01"];

/// Map a sqlx error onto the store's two-way classification.
fn store_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if let Some(code) = db_err.code() {
            let code: &str = &code;
            if RETRYABLE_CODES.contains(&code) {
                let constraint = db_err.constraint().unwrap_or("none");
                tracing::debug!(%code, constraint, "Retryable database conflict");
                return StoreError::Conflict(format!(
                    "Concurrent modification detected ({code}, constraint {constraint})"
                ));
            }
        }
    }
    tracing::error!(error = %err, "Database error");
    StoreError::Failure(err.to_string())
}

fn stale(id: DbId) -> StoreError {
    StoreError::Conflict(format!("BomNode {id} was modified concurrently"))
}

/// [`HierarchyStore`] backed by the `bom_nodes` table.
#[derive(Clone)]
pub struct PgHierarchyStore {
    pool: DbPool,
}

impl PgHierarchyStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HierarchyStore for PgHierarchyStore {
    async fn create(&self, node: NewBomNode) -> StoreResult<BomNode> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        if let Some(parent_id) = node.parent_id {
            let expected = path::parent_prefix(&node.path).ok_or_else(|| {
                StoreError::Failure(format!("Child path {} has no parent prefix", node.path))
            })?;
            let touched = BomNodeRepo::touch_parent(&mut *tx, parent_id, expected)
                .await
                .map_err(store_err)?;
            if !touched {
                return Err(StoreError::Conflict(format!(
                    "Parent BomNode {parent_id} moved or was deleted during create"
                )));
            }
        }

        let row = BomNodeRepo::insert(&mut *tx, &node)
            .await
            .map_err(store_err)?;
        tx.commit().await.map_err(store_err)?;
        Ok(row.into())
    }

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<BomNode>> {
        let row = BomNodeRepo::find_by_id(&self.pool, id)
            .await
            .map_err(store_err)?;
        Ok(row.map(Into::into))
    }

    async fn find_by_root_id(&self, root_product_id: ProductId) -> StoreResult<Vec<BomNode>> {
        let rows = BomNodeRepo::list_by_root(&self.pool, root_product_id)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_all(&self) -> StoreResult<Vec<BomNode>> {
        let rows = BomNodeRepo::list(&self.pool).await.map_err(store_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_by_path_prefix(&self, prefix: &str) -> StoreResult<Vec<BomNode>> {
        let rows = BomNodeRepo::list_by_path_prefix(&self.pool, prefix)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_where(
        &self,
        root_product_id: ProductId,
        parent_id: Option<DbId>,
    ) -> StoreResult<i64> {
        BomNodeRepo::count_siblings(&self.pool, root_product_id, parent_id)
            .await
            .map_err(store_err)
    }

    async fn next_sibling_index(
        &self,
        root_product_id: ProductId,
        parent_id: Option<DbId>,
    ) -> StoreResult<i64> {
        BomNodeRepo::next_sibling_index(&self.pool, SiblingScope::of(root_product_id, parent_id))
            .await
            .map_err(store_err)
    }

    async fn update(&self, node: BomNode) -> StoreResult<BomNode> {
        let mut conn = self.pool.acquire().await.map_err(store_err)?;
        let id = node.id;
        BomNodeRepo::update_versioned(&mut *conn, &node)
            .await
            .map_err(store_err)?
            .map(Into::into)
            .ok_or_else(|| stale(id))
    }

    async fn batch_update(&self, batch: WriteBatch) -> StoreResult<Vec<BomNode>> {
        let touch_count = batch.touches.len();
        let mut rows: Vec<(BomNode, bool)> = batch
            .updates
            .into_iter()
            .map(|n| (n, false))
            .chain(batch.touches.into_iter().map(|n| (n, true)))
            .collect();
        rows.sort_by_key(|(n, _)| n.id);
        if rows.windows(2).any(|w| w[0].0.id == w[1].0.id) {
            return Err(StoreError::Failure("batch contains duplicate ids".into()));
        }

        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let mut committed = Vec::with_capacity(rows.len() - touch_count);
        for (node, touch_only) in &rows {
            // Dropping `tx` on an early return rolls the batch back.
            if *touch_only {
                let ok = BomNodeRepo::touch_versioned(&mut *tx, node.id, node.version)
                    .await
                    .map_err(store_err)?;
                if !ok {
                    return Err(stale(node.id));
                }
                continue;
            }
            let row = BomNodeRepo::update_versioned(&mut *tx, node)
                .await
                .map_err(store_err)?
                .ok_or_else(|| stale(node.id))?;
            committed.push(BomNode::from(row));
        }
        tx.commit().await.map_err(store_err)?;

        tracing::debug!(rows = committed.len(), "Batch update committed");
        Ok(committed)
    }

    async fn soft_delete(&self, id: DbId) -> StoreResult<()> {
        BomNodeRepo::soft_delete(&self.pool, id)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn soft_delete_batch(&self, mut nodes: Vec<BomNode>) -> StoreResult<u64> {
        nodes.sort_by_key(|n| n.id);
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let mut deleted = 0u64;
        for node in &nodes {
            let ok = BomNodeRepo::soft_delete_versioned(&mut *tx, node.id, node.version)
                .await
                .map_err(store_err)?;
            if !ok {
                return Err(stale(node.id));
            }
            deleted += 1;
        }
        tx.commit().await.map_err(store_err)?;
        Ok(deleted)
    }

    async fn ping(&self) -> StoreResult<()> {
        crate::health_check(&self.pool).await.map_err(store_err)
    }
}
