//! Collapse / visibility resolver.
//!
//! The collapse set is raw state: the ids the user folded.  Everything else in
//! this module is derived from it and from the forest, and is recomputed on
//! every call; node data is never touched.  A node is hidden iff some strict
//! ancestor is collapsed, so re-expanding a node restores exactly the visible
//! set (and therefore the layout) that existed before it was collapsed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::node::{Edge, Node, NodeId};
use super::tree::Forest;

/// Ids of the nodes currently collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollapseSet {
    ids: BTreeSet<NodeId>,
}

impl CollapseSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the set from the `collapsed` flags carried on a snapshot.
    pub fn from_nodes(nodes: &[Node]) -> Self {
        Self {
            ids: nodes
                .iter()
                .filter(|n| n.collapsed)
                .map(|n| n.id.clone())
                .collect(),
        }
    }

    /// Flips membership of `id` and returns the new state (`true` = collapsed).
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    pub fn insert(&mut self, id: impl Into<NodeId>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Drops ids that no longer exist in `forest`.
    pub fn retain_existing(&mut self, forest: &Forest) {
        self.ids.retain(|id| forest.contains(id));
    }
}

/// Derived visibility of every slot of a forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visibility {
    visible: Vec<bool>,
    collapsed: Vec<bool>,
    descendant_count: Vec<usize>,
    collapsed_child_count: Vec<usize>,
}

impl Visibility {
    pub fn is_visible(&self, slot: usize) -> bool {
        self.visible[slot]
    }

    /// Per-slot visibility, suitable for [`Forest::subforest`].
    pub fn mask(&self) -> &[bool] {
        &self.visible
    }

    /// `true` if the slot is in the collapse set and has at least one child.
    pub fn is_collapsed(&self, slot: usize) -> bool {
        self.collapsed[slot]
    }

    /// Full subtree size, independent of collapse state.
    pub fn descendant_count(&self, slot: usize) -> usize {
        self.descendant_count[slot]
    }

    /// Number of nodes hidden by this slot's own collapse.
    pub fn collapsed_child_count(&self, slot: usize) -> usize {
        self.collapsed_child_count[slot]
    }

    pub fn visible_count(&self) -> usize {
        self.visible.iter().filter(|v| **v).count()
    }

    pub fn hidden_count(&self) -> usize {
        self.visible.len() - self.visible_count()
    }

    /// Keeps the edges whose two endpoints are both visible.
    pub fn visible_edges(&self, forest: &Forest, edges: &[Edge]) -> Vec<Edge> {
        edges
            .iter()
            .filter(|e| {
                let shown = |id: &str| forest.slot_of(id).is_some_and(|s| self.visible[s]);
                shown(&e.from) && shown(&e.to)
            })
            .cloned()
            .collect()
    }
}

/// Resolves which slots of `forest` are visible under `collapsed`.
///
/// Collapsed ids that do not exist, and collapsed leaves, have no effect.
pub fn compute_visible(forest: &Forest, collapsed: &CollapseSet) -> Visibility {
    let n = forest.len();
    let descendant_count = forest.descendant_counts();
    let mut visible = vec![false; n];
    let mut is_collapsed = vec![false; n];
    let mut collapsed_child_count = vec![0usize; n];

    for &slot in forest.preorder() {
        is_collapsed[slot] =
            !forest.children(slot).is_empty() && collapsed.contains(forest.id(slot));
        if is_collapsed[slot] {
            collapsed_child_count[slot] = descendant_count[slot];
        }
        visible[slot] = match forest.parent(slot) {
            Some(parent) => visible[parent] && !is_collapsed[parent],
            None => true,
        };
    }

    Visibility {
        visible,
        collapsed: is_collapsed,
        descendant_count,
        collapsed_child_count,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
