//! Materialized path generation and path arithmetic.
//!
//! A path is `"{root_product_id}/{i1}/{i2}/..."` where each `iN` is the
//! 1-based sibling index the ancestor at that level received when it was
//! placed. A node's path is always its parent's path plus `/` plus its own
//! index; a top-level node's path is `"{root_product_id}/{index}"`.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::CoreError;
use crate::node::BomNode;
use crate::store::HierarchyStore;
use crate::types::{DbId, ProductId};

pub const SEPARATOR: char = '/';

// ---------------------------------------------------------------------------
// Sibling indexing strategy
// ---------------------------------------------------------------------------

/// How a new node's sibling index is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiblingIndexing {
    /// Per-parent monotonic counter kept by the store. Indices are never
    /// reused, so a live path never coincides with a tombstoned one.
    #[default]
    Sequence,
    /// Live sibling count plus one. Only collision-free when creates under
    /// one parent are serialized externally.
    LiveCount,
}

impl FromStr for SiblingIndexing {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequence" => Ok(Self::Sequence),
            "live-count" | "live_count" | "count" => Ok(Self::LiveCount),
            other => Err(CoreError::Validation(format!(
                "Unknown sibling indexing strategy '{other}', expected 'sequence' or 'live-count'"
            ))),
        }
    }
}

impl fmt::Display for SiblingIndexing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence => f.write_str("sequence"),
            Self::LiveCount => f.write_str("live-count"),
        }
    }
}

// ---------------------------------------------------------------------------
// Path arithmetic
// ---------------------------------------------------------------------------

pub fn root_level_path(root_product_id: ProductId, index: i64) -> String {
    format!("{root_product_id}{SEPARATOR}{index}")
}

pub fn child_path(parent_path: &str, index: i64) -> String {
    format!("{parent_path}{SEPARATOR}{index}")
}

/// The path a node's parent must have, i.e. everything before the last
/// separator. For top-level nodes this is the root product id.
pub fn parent_prefix(path: &str) -> Option<&str> {
    path.rsplit_once(SEPARATOR).map(|(prefix, _)| prefix)
}

/// The last segment of a path parsed as a sibling index.
pub fn sibling_index(path: &str) -> Option<i64> {
    path.rsplit_once(SEPARATOR)
        .and_then(|(_, last)| last.parse().ok())
        .filter(|index: &i64| *index > 0)
}

/// Prefix matching every strict descendant of `path`.
pub fn descendant_prefix(path: &str) -> String {
    format!("{path}{SEPARATOR}")
}

/// Whether `path` lies strictly below `ancestor`. The comparison is
/// separator-aware: `"5/12"` is not below `"5/1"`.
pub fn is_strict_descendant(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len() + 1
        && path.starts_with(ancestor)
        && path[ancestor.len()..].starts_with(SEPARATOR)
}

/// Whether `path` is `ancestor` itself or lies below it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    path == ancestor || is_strict_descendant(path, ancestor)
}

/// Replace the leading `old_base` of a descendant path with `new_base`,
/// keeping the remainder verbatim. `None` if `path` is not below `old_base`.
pub fn rebase(path: &str, old_base: &str, new_base: &str) -> Option<String> {
    if !is_strict_descendant(path, old_base) {
        return None;
    }
    Some(format!("{new_base}{}", &path[old_base.len()..]))
}

/// Whether `path` starts with the root product id followed by at least one
/// positive sibling index.
pub fn is_well_formed(path: &str, root_product_id: ProductId) -> bool {
    let mut segments = path.split(SEPARATOR);
    if segments.next() != Some(root_product_id.to_string().as_str()) {
        return false;
    }
    let mut count = 0;
    for segment in segments {
        match segment.parse::<i64>() {
            Ok(index) if index > 0 => count += 1,
            _ => return false,
        }
    }
    count > 0
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Computes the path a node gets when placed under a root/parent.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathGenerator {
    indexing: SiblingIndexing,
}

impl PathGenerator {
    pub fn new(indexing: SiblingIndexing) -> Self {
        Self { indexing }
    }

    /// Load the parent a node will be placed under.
    ///
    /// Fails with `NotFound` when the parent is absent or tombstoned, and with
    /// `InvalidOperation` when it belongs to another root product.
    pub async fn resolve_parent(
        &self,
        store: &dyn HierarchyStore,
        root_product_id: ProductId,
        parent_id: Option<DbId>,
    ) -> Result<Option<BomNode>, CoreError> {
        let Some(parent_id) = parent_id else {
            return Ok(None);
        };
        let parent = store
            .find_by_id(parent_id)
            .await?
            .filter(|p| !p.is_deleted())
            .ok_or(CoreError::NotFound {
                entity: "Parent BomNode",
                id: parent_id,
            })?;
        if parent.root_product_id != root_product_id {
            return Err(CoreError::InvalidOperation(format!(
                "Parent {} belongs to root product {}, not {root_product_id}",
                parent.id, parent.root_product_id
            )));
        }
        Ok(Some(parent))
    }

    /// Allocate the next sibling index under an already resolved parent and
    /// build the resulting path.
    pub async fn next_path(
        &self,
        store: &dyn HierarchyStore,
        root_product_id: ProductId,
        parent: Option<&BomNode>,
    ) -> Result<String, CoreError> {
        let parent_id = parent.map(|p| p.id);
        let index = match self.indexing {
            SiblingIndexing::Sequence => {
                store.next_sibling_index(root_product_id, parent_id).await?
            }
            SiblingIndexing::LiveCount => store.count_where(root_product_id, parent_id).await? + 1,
        };
        Ok(match parent {
            Some(parent) => child_path(&parent.path, index),
            None => root_level_path(root_product_id, index),
        })
    }

    /// Resolve the parent and compute the path in one step.
    pub async fn generate_path(
        &self,
        store: &dyn HierarchyStore,
        root_product_id: ProductId,
        parent_id: Option<DbId>,
    ) -> Result<String, CoreError> {
        let parent = self
            .resolve_parent(store, root_product_id, parent_id)
            .await?;
        self.next_path(store, root_product_id, parent.as_ref()).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
