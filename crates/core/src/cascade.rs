//! Reparenting with cascading path rewrite.
//!
//! A move resolves the new parent, rejects cycles before any sibling index is
//! allocated, computes the new path, then stages the moved node, every live
//! descendant (path prefix swapped, remainder kept) and a version-only touch
//! of the new parent. The staged rows go to the store as one atomic batch, so either
//! all paths change or none do.

use tracing::{info, warn};

use crate::error::CoreError;
use crate::node::{BomNode, MoveTarget};
use crate::path::{self, PathGenerator};
use crate::store::{HierarchyStore, WriteBatch};

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

/// Reject placing `node` under itself or under one of its descendants.
pub fn ensure_not_own_ancestor(
    node: &BomNode,
    new_parent: Option<&BomNode>,
) -> Result<(), CoreError> {
    let Some(parent) = new_parent else {
        return Ok(());
    };
    if parent.id == node.id || path::is_within(&parent.path, &node.path) {
        return Err(CoreError::InvalidOperation(format!(
            "Cannot move BomNode {} under {} because it is part of its own subtree",
            node.id, parent.id
        )));
    }
    Ok(())
}

/// Second line of defence once the new path is known.
pub fn ensure_path_outside_subtree(old_path: &str, new_path: &str) -> Result<(), CoreError> {
    if path::is_within(new_path, old_path) {
        return Err(CoreError::InvalidOperation(format!(
            "New path {new_path} would nest the node under its own subtree {old_path}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Staging
// ---------------------------------------------------------------------------

/// Rows staged for one move, before they are committed.
#[derive(Debug, Clone)]
pub struct MovePlan {
    pub old_path: String,
    pub moved: BomNode,
    pub descendants: Vec<BomNode>,
    /// The new parent. Its version is checked and bumped, nothing else.
    pub new_parent: Option<BomNode>,
}

impl MovePlan {
    /// Stage the move of `node` (already carrying any field edits) to
    /// `target`, rewriting `descendants` loaded under the old path.
    pub fn stage(
        mut node: BomNode,
        target: MoveTarget,
        new_parent: Option<BomNode>,
        new_path: String,
        descendants: Vec<BomNode>,
        actor: &str,
    ) -> Result<Self, CoreError> {
        let old_path = std::mem::replace(&mut node.path, new_path);
        node.root_product_id = target.root_product_id;
        node.parent_id = target.parent_id;
        node.updated_by = Some(actor.to_string());

        let descendants = descendants
            .into_iter()
            .filter(|d| d.id != node.id)
            .map(|mut d| {
                d.path = path::rebase(&d.path, &old_path, &node.path).ok_or_else(|| {
                    CoreError::StoreFailure(format!(
                        "Store returned {} ({}) as a descendant of {old_path}",
                        d.id, d.path
                    ))
                })?;
                d.root_product_id = target.root_product_id;
                d.updated_by = Some(actor.to_string());
                Ok(d)
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        Ok(Self {
            old_path,
            moved: node,
            descendants,
            new_parent,
        })
    }

    pub fn into_batch(self) -> WriteBatch {
        let mut updates = Vec::with_capacity(self.descendants.len() + 1);
        updates.push(self.moved);
        updates.extend(self.descendants);
        WriteBatch {
            updates,
            touches: self.new_parent.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Result of a committed move.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub node: BomNode,
    pub old_path: String,
    pub descendants_rewritten: usize,
}

/// Runs a move against a store.
pub struct MoveCascade<'a> {
    store: &'a dyn HierarchyStore,
    paths: PathGenerator,
}

impl<'a> MoveCascade<'a> {
    pub fn new(store: &'a dyn HierarchyStore, paths: PathGenerator) -> Self {
        Self { store, paths }
    }

    pub async fn execute(
        &self,
        node: BomNode,
        target: MoveTarget,
        actor: &str,
    ) -> Result<MoveOutcome, CoreError> {
        let new_parent = self
            .paths
            .resolve_parent(self.store, target.root_product_id, target.parent_id)
            .await?;
        ensure_not_own_ancestor(&node, new_parent.as_ref())?;

        let new_path = self
            .paths
            .next_path(self.store, target.root_product_id, new_parent.as_ref())
            .await?;
        ensure_path_outside_subtree(&node.path, &new_path)?;

        let descendants = self
            .store
            .find_by_path_prefix(&path::descendant_prefix(&node.path))
            .await?;

        let plan = MovePlan::stage(node, target, new_parent, new_path, descendants, actor)?;
        let id = plan.moved.id;
        let old_path = plan.old_path.clone();
        let descendants_rewritten = plan.descendants.len();

        let committed = self
            .store
            .batch_update(plan.into_batch())
            .await
            .inspect_err(|err| warn!(id, old_path = %old_path, error = %err, "Move aborted"))?;
        let node = committed
            .into_iter()
            .find(|n| n.id == id)
            .ok_or_else(|| CoreError::StoreFailure(format!("Move of {id} returned no row")))?;

        info!(
            id,
            old_path = %old_path,
            new_path = %node.path,
            descendants = descendants_rewritten,
            "BomNode moved"
        );

        Ok(MoveOutcome {
            node,
            old_path,
            descendants_rewritten,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
