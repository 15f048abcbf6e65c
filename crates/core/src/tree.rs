//! Forest reconstruction from a flat node collection.
//!
//! Runs in O(n): one pass indexes nodes by id, one pass links children to
//! parents by index, and a final pass materializes nested views. A node whose
//! parent is not in the collection becomes a forest root. Sibling order is
//! the order of the input.

use std::collections::HashMap;

use crate::node::{BomNode, TreeNodeView};
use crate::types::DbId;

/// Build a forest of nested views from `nodes`.
pub fn build_forest(nodes: &[BomNode]) -> Vec<TreeNodeView> {
    let index: HashMap<DbId, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id, i))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut roots: Vec<usize> = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        match node.parent_id.and_then(|pid| index.get(&pid)) {
            Some(&parent) if parent != i => children[parent].push(i),
            _ => roots.push(i),
        }
    }

    let mut emitted = vec![false; nodes.len()];
    let mut forest: Vec<TreeNodeView> = roots
        .into_iter()
        .map(|i| materialize(i, nodes, &children, &mut emitted))
        .collect();

    // Anything not reached from a root sits in a parent_id cycle; surface
    // each such group once, starting from its first node in input order.
    for i in 0..nodes.len() {
        if !emitted[i] {
            forest.push(materialize(i, nodes, &children, &mut emitted));
        }
    }
    forest
}

fn materialize(
    i: usize,
    nodes: &[BomNode],
    children: &[Vec<usize>],
    emitted: &mut [bool],
) -> TreeNodeView {
    emitted[i] = true;
    let mut view = TreeNodeView::leaf(&nodes[i]);
    for &child in &children[i] {
        if !emitted[child] {
            view.children
                .push(materialize(child, nodes, children, emitted));
        }
    }
    view
}

/// Total number of nodes in a forest.
pub fn count_nodes(forest: &[TreeNodeView]) -> usize {
    forest
        .iter()
        .map(|n| 1 + count_nodes(&n.children))
        .sum()
}
