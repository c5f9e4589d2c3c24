//! Tree builder: turns a flat node list into an arena-backed forest.
//!
//! The backend only ships parent references.  [`Forest::build`] indexes the
//! nodes, links every node to its parent, and sorts each sibling group by
//! `(order, id)`.  The result is a dense slot array with per-slot child index
//! lists, which is what the layout engine and the collapse resolver walk.
//!
//! # Malformed input
//!
//! None of the following is an error; the builder always returns a forest
//! that contains every distinct node id exactly once:
//!
//! - **Dangling or missing parent**: the node is an *orphan*.  When a sentinel
//!   root exists, orphans hang off it after its regular children; otherwise
//!   each orphan is its own root.
//! - **Self reference**: only the sentinel may point at itself.  If several
//!   nodes do, the smallest id is the sentinel and the rest are orphans.
//! - **Duplicate id**: the first occurrence wins.
//! - **Cycle**: the node with the highest id on the cycle loses its parent
//!   link and becomes an orphan.  The cut is recorded in
//!   [`Forest::broken_links`].

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use super::node::{Edge, EdgeType, Node, NodeId, NodeType};

/// A parent link dropped to break a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenLink {
    pub child: NodeId,
    pub parent: NodeId,
}

#[derive(Debug, Clone)]
struct Slot {
    id: NodeId,
    node_type: NodeType,
    order: i64,
    parent: Option<usize>,
    children: Vec<usize>,
    orphan: bool,
    depth: usize,
}

/// Arena of nodes linked by parent/child slot indices.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    slots: Vec<Slot>,
    index: HashMap<NodeId, usize>,
    roots: Vec<usize>,
    preorder: Vec<usize>,
    sentinel: Option<usize>,
    broken_links: Vec<BrokenLink>,
}

impl Forest {
    /// Builds a forest from a flat node list.
    ///
    /// Runs in O(n log n), dominated by sorting the sibling groups.
    pub fn build(nodes: &[Node]) -> Self {
        let mut forest = Forest::default();
        let mut raw_parents: Vec<Option<&str>> = Vec::with_capacity(nodes.len());

        for node in nodes {
            if forest.index.contains_key(&node.id) {
                warn!(node_id = %node.id, "duplicate node id, keeping first occurrence");
                continue;
            }
            forest.index.insert(node.id.clone(), forest.slots.len());
            forest.slots.push(Slot {
                id: node.id.clone(),
                node_type: node.node_type,
                order: node.order,
                parent: None,
                children: Vec::new(),
                orphan: false,
                depth: 0,
            });
            raw_parents.push(node.parent_id.as_deref());
        }

        forest.sentinel = (0..forest.slots.len())
            .filter(|&i| raw_parents[i] == Some(forest.slots[i].id.as_str()))
            .min_by(|&a, &b| forest.slots[a].id.cmp(&forest.slots[b].id));

        // Link parents.
        for i in 0..forest.slots.len() {
            if Some(i) == forest.sentinel {
                continue;
            }
            let resolved = match raw_parents[i] {
                Some(p) if p == forest.slots[i].id => {
                    warn!(node_id = %forest.slots[i].id, "non-root self reference, treating as orphan");
                    None
                }
                Some(p) => forest.index.get(p).copied(),
                None => None,
            };
            match resolved {
                Some(parent) => {
                    forest.slots[i].parent = Some(parent);
                    forest.slots[parent].children.push(i);
                }
                None => {
                    if let Some(p) = raw_parents[i] {
                        debug!(node_id = %forest.slots[i].id, parent_id = p, "dangling parent reference");
                    }
                    forest.slots[i].orphan = true;
                }
            }
        }

        forest.break_cycles();

        for i in 0..forest.slots.len() {
            forest.sort_children(i);
        }

        let mut orphans: Vec<usize> = (0..forest.slots.len())
            .filter(|&i| forest.slots[i].orphan)
            .collect();
        orphans.sort_by(|&a, &b| forest.sibling_cmp(a, b));

        match forest.sentinel {
            Some(root) => {
                for &orphan in &orphans {
                    forest.slots[orphan].parent = Some(root);
                }
                forest.slots[root].children.extend(orphans);
                forest.roots = vec![root];
            }
            None => forest.roots = orphans,
        }

        forest.finish();
        debug!(
            nodes = forest.slots.len(),
            roots = forest.roots.len(),
            broken_links = forest.broken_links.len(),
            "forest built"
        );
        forest
    }

    /// Returns a forest restricted to the slots for which `keep[slot]` is
    /// `true`.  Sibling order is preserved; a kept slot whose parent is not
    /// kept becomes a root.
    pub fn subforest(&self, keep: &[bool]) -> Forest {
        let kept = |slot: usize| keep.get(slot).copied().unwrap_or(false);
        let mut remap = vec![usize::MAX; self.slots.len()];
        let mut sub = Forest::default();

        for &old in &self.preorder {
            if !kept(old) {
                continue;
            }
            let slot = &self.slots[old];
            remap[old] = sub.slots.len();
            sub.index.insert(slot.id.clone(), sub.slots.len());
            sub.slots.push(Slot {
                id: slot.id.clone(),
                node_type: slot.node_type,
                order: slot.order,
                parent: None,
                children: Vec::new(),
                orphan: slot.orphan,
                depth: 0,
            });
        }

        for &old in &self.preorder {
            if !kept(old) {
                continue;
            }
            let new = remap[old];
            match self.slots[old].parent.filter(|&p| kept(p)) {
                Some(parent) => sub.slots[new].parent = Some(remap[parent]),
                None => sub.roots.push(new),
            }
            sub.slots[new].children = self.slots[old]
                .children
                .iter()
                .filter(|&&c| kept(c))
                .map(|&c| remap[c])
                .collect();
        }

        sub.sentinel = self.sentinel.filter(|&s| kept(s)).map(|s| remap[s]);
        sub.broken_links = self.broken_links.clone();
        sub.finish();
        sub
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Root slots in stacking order.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// All slots, parents before children, siblings in sort order.
    pub fn preorder(&self) -> &[usize] {
        &self.preorder
    }

    pub fn children(&self, slot: usize) -> &[usize] {
        &self.slots[slot].children
    }

    pub fn parent(&self, slot: usize) -> Option<usize> {
        self.slots[slot].parent
    }

    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn id(&self, slot: usize) -> &str {
        &self.slots[slot].id
    }

    pub fn node_type(&self, slot: usize) -> NodeType {
        self.slots[slot].node_type
    }

    pub fn order(&self, slot: usize) -> i64 {
        self.slots[slot].order
    }

    /// Distance from the slot's root (roots are at depth 0).
    pub fn depth(&self, slot: usize) -> usize {
        self.slots[slot].depth
    }

    /// Returns `true` if the node's parent reference did not resolve (or was
    /// cut to break a cycle).
    pub fn is_orphan(&self, slot: usize) -> bool {
        self.slots[slot].orphan
    }

    pub fn sentinel(&self) -> Option<usize> {
        self.sentinel
    }

    pub fn orphans(&self) -> Vec<usize> {
        self.preorder
            .iter()
            .copied()
            .filter(|&s| self.slots[s].orphan)
            .collect()
    }

    pub fn broken_links(&self) -> &[BrokenLink] {
        &self.broken_links
    }

    /// Number of descendants (excluding the slot itself) for every slot.
    pub fn descendant_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.slots.len()];
        for &slot in self.preorder.iter().rev() {
            if let Some(parent) = self.slots[slot].parent {
                counts[parent] += counts[slot] + 1;
            }
        }
        counts
    }

    /// Number of descendants of a single slot.
    pub fn subtree_size(&self, slot: usize) -> usize {
        self.descendants(slot).len()
    }

    /// All descendants of `slot` in pre-order, excluding `slot` itself.
    pub fn descendants(&self, slot: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.slots[slot].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.slots[next].children.iter().rev().copied());
        }
        out
    }

    /// Returns `true` if `ancestor` lies strictly above `slot`.
    pub fn is_ancestor(&self, ancestor: usize, slot: usize) -> bool {
        let mut current = self.slots[slot].parent;
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.slots[p].parent;
        }
        false
    }

    /// Slots from `slot` up to its root, inclusive on both ends.
    pub fn path_to_root(&self, slot: usize) -> Vec<usize> {
        let mut path = vec![slot];
        let mut current = self.slots[slot].parent;
        while let Some(p) = current {
            path.push(p);
            current = self.slots[p].parent;
        }
        path
    }

    /// Derives one edge per parent link.
    ///
    /// `hints` are backend-supplied edges; they only contribute the edge type
    /// of a link that also exists in the forest.  Orphan attachments are
    /// [`EdgeType::Detached`].
    pub fn edges(&self, hints: &[Edge]) -> Vec<Edge> {
        let hinted: HashMap<(&str, &str), EdgeType> = hints
            .iter()
            .map(|e| ((e.from.as_str(), e.to.as_str()), e.edge_type))
            .collect();

        self.preorder
            .iter()
            .filter_map(|&child| {
                let parent = self.slots[child].parent?;
                let from = self.slots[parent].id.as_str();
                let to = self.slots[child].id.as_str();
                let edge_type = if self.slots[child].orphan {
                    EdgeType::Detached
                } else if let Some(&hint) = hinted.get(&(from, to)) {
                    hint
                } else if self.slots[child].node_type == NodeType::LogicDevice
                    || self.slots[parent].node_type == NodeType::LogicDevice
                {
                    EdgeType::Logical
                } else {
                    EdgeType::Wired
                };
                Some(Edge {
                    from: from.to_string(),
                    to: to.to_string(),
                    edge_type,
                })
            })
            .collect()
    }

    // ── Private helpers ───────────────────────────────────────────────────────

    fn sibling_cmp(&self, a: usize, b: usize) -> Ordering {
        let (sa, sb) = (&self.slots[a], &self.slots[b]);
        sa.order.cmp(&sb.order).then_with(|| sa.id.cmp(&sb.id))
    }

    fn sort_children(&mut self, slot: usize) {
        let mut children = std::mem::take(&mut self.slots[slot].children);
        children.sort_by(|&a, &b| self.sibling_cmp(a, b));
        self.slots[slot].children = children;
    }

    /// Cuts one link per cycle so that every slot is reachable from a
    /// parentless slot.
    fn break_cycles(&mut self) {
        let mut reached = vec![false; self.slots.len()];
        let starts: Vec<usize> = (0..self.slots.len())
            .filter(|&i| self.slots[i].parent.is_none())
            .collect();
        for start in starts {
            self.mark_reached(start, &mut reached);
        }

        let mut unreached: Vec<usize> = (0..self.slots.len()).filter(|&i| !reached[i]).collect();
        unreached.sort_by(|&a, &b| self.slots[a].id.cmp(&self.slots[b].id));

        for start in unreached {
            if reached[start] {
                continue;
            }
            // Every unreached chain ends in a cycle; find it.
            let mut seen_at: HashMap<usize, usize> = HashMap::new();
            let mut walk = Vec::new();
            let mut current = start;
            let cycle_start = loop {
                if let Some(&pos) = seen_at.get(&current) {
                    break pos;
                }
                seen_at.insert(current, walk.len());
                walk.push(current);
                match self.slots[current].parent {
                    Some(p) => current = p,
                    None => break walk.len(),
                }
            };
            let Some(&loser) = walk[cycle_start..]
                .iter()
                .max_by(|&&a, &&b| self.slots[a].id.cmp(&self.slots[b].id))
            else {
                continue;
            };
            let Some(parent) = self.slots[loser].parent.take() else {
                continue;
            };
            self.slots[parent].children.retain(|&c| c != loser);
            self.slots[loser].orphan = true;
            warn!(
                node_id = %self.slots[loser].id,
                parent_id = %self.slots[parent].id,
                "parent cycle detected, dropping link"
            );
            self.broken_links.push(BrokenLink {
                child: self.slots[loser].id.clone(),
                parent: self.slots[parent].id.clone(),
            });
            self.mark_reached(loser, &mut reached);
        }
    }

    fn mark_reached(&self, start: usize, reached: &mut [bool]) {
        let mut stack = vec![start];
        while let Some(slot) = stack.pop() {
            if reached[slot] {
                continue;
            }
            reached[slot] = true;
            stack.extend(self.slots[slot].children.iter().copied());
        }
    }

    /// Recomputes the pre-order sequence and depths from the root list.
    fn finish(&mut self) {
        self.preorder.clear();
        self.preorder.reserve(self.slots.len());
        let mut stack: Vec<(usize, usize)> = self.roots.iter().rev().map(|&r| (r, 0)).collect();
        while let Some((slot, depth)) = stack.pop() {
            self.slots[slot].depth = depth;
            self.preorder.push(slot);
            stack.extend(
                self.slots[slot]
                    .children
                    .iter()
                    .rev()
                    .map(|&c| (c, depth + 1)),
            );
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
