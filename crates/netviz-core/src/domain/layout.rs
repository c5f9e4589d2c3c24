//! Deterministic hierarchical layout engine.
//!
//! Positions are derived, never stored.  Given a [`Forest`], a per-type height
//! table and two spacing constants, [`compute_layout`] assigns every node an
//! `{x, y}` such that:
//!
//! - depth alone decides `x` (`x = depth * depth_spacing`);
//! - sibling subtrees never overlap along `y`;
//! - a parent is centred on the combined span of its children;
//! - leaves stack in sibling order with a fixed gap.
//!
//! The engine knows nothing about collapse.  Callers that hide subtrees pass a
//! forest that already excludes them (see [`Forest::subforest`]).
//!
//! Both passes are iterative so very deep chains cannot exhaust the call stack,
//! and every sum runs in sibling order, so the same input always yields
//! bit-identical output.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::node::{NodeId, NodeType};
use super::tree::Forest;

/// Height used for any type without an explicit entry.
const DEFAULT_NODE_HEIGHT: f64 = 36.0;

/// Per-node-type box height along the stacking axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeHeights {
    #[serde(default = "default_node_height")]
    pub default_height: f64,
    #[serde(default)]
    pub overrides: BTreeMap<NodeType, f64>,
}

fn default_node_height() -> f64 {
    DEFAULT_NODE_HEIGHT
}

impl NodeHeights {
    /// A table where every type has the same height.
    pub fn uniform(height: f64) -> Self {
        Self {
            default_height: height,
            overrides: BTreeMap::new(),
        }
    }

    /// Returns the height for `node_type`.  Negative or non-finite values are
    /// treated as zero.
    pub fn height_of(&self, node_type: NodeType) -> f64 {
        let raw = self
            .overrides
            .get(&node_type)
            .copied()
            .unwrap_or(self.default_height);
        non_negative(raw)
    }
}

impl Default for NodeHeights {
    fn default() -> Self {
        let overrides = BTreeMap::from([
            (NodeType::Internet, 48.0),
            (NodeType::Router, 44.0),
            (NodeType::Gateway, 44.0),
            (NodeType::Switch, 40.0),
            (NodeType::AccessPoint, 40.0),
            (NodeType::Server, 40.0),
            (NodeType::Client, 32.0),
            (NodeType::LogicDevice, 36.0),
            (NodeType::Aranea, 32.0),
        ]);
        Self {
            default_height: DEFAULT_NODE_HEIGHT,
            overrides,
        }
    }
}

/// Spacing constants and height table for one layout run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutParams {
    /// Distance between consecutive depth columns.
    pub depth_spacing: f64,
    /// Gap between adjacent sibling subtrees (and between root trees).
    pub sibling_gap: f64,
    pub heights: NodeHeights,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            depth_spacing: 220.0,
            sibling_gap: 16.0,
            heights: NodeHeights::default(),
        }
    }
}

/// Top-left corner of a node box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Geometry computed for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedNode {
    pub id: NodeId,
    pub position: Position,
    /// Own box height.
    pub height: f64,
    /// Height of the band reserved for the node's whole subtree.
    pub extent: f64,
    /// Top of that band.
    pub span_start: f64,
}

impl PlacedNode {
    /// Bottom of the subtree band (exclusive).
    pub fn span_end(&self) -> f64 {
        self.span_start + self.extent
    }
}

/// Output of [`compute_layout`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    /// Placed nodes in forest pre-order.
    nodes: Vec<PlacedNode>,
    index: HashMap<NodeId, usize>,
    width: f64,
    height: f64,
}

impl Layout {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn position(&self, id: &str) -> Option<Position> {
        self.placed(id).map(|p| p.position)
    }

    pub fn placed(&self, id: &str) -> Option<&PlacedNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Placed nodes in forest pre-order.
    pub fn iter(&self) -> impl Iterator<Item = &PlacedNode> {
        self.nodes.iter()
    }

    /// Largest `x` of any node.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Bottom edge of the lowest node box.
    pub fn height(&self) -> f64 {
        self.height
    }
}

/// Computes positions for every node in `forest`.
///
/// Never fails: an empty forest yields an empty layout, and malformed sizes
/// are clamped to zero.
pub fn compute_layout(forest: &Forest, params: &LayoutParams) -> Layout {
    let n = forest.len();
    if n == 0 {
        return Layout::default();
    }
    let gap = non_negative(params.sibling_gap);
    let depth_spacing = non_negative(params.depth_spacing);

    let own: Vec<f64> = (0..n)
        .map(|slot| params.heights.height_of(forest.node_type(slot)))
        .collect();

    // Pass 1: subtree extents, children before parents.
    let mut extent = vec![0.0f64; n];
    let mut children_span = vec![0.0f64; n];
    for &slot in forest.preorder().iter().rev() {
        let children = forest.children(slot);
        if children.is_empty() {
            extent[slot] = own[slot];
            continue;
        }
        let mut span = 0.0;
        for &child in children {
            span += extent[child];
        }
        span += gap * (children.len() - 1) as f64;
        children_span[slot] = span;
        extent[slot] = own[slot].max(span);
    }

    // Pass 2: placement, parents before children.
    let mut placed: Vec<Option<(Position, f64)>> = vec![None; n];
    let mut stack: Vec<(usize, f64, f64)> = Vec::with_capacity(n);
    let mut cursor = 0.0;
    for &root in forest.roots() {
        stack.push((root, 0.0, cursor));
        cursor += extent[root] + gap;
    }
    while let Some((slot, x, start)) = stack.pop() {
        let y = start + extent[slot] / 2.0 - own[slot] / 2.0;
        placed[slot] = Some((Position { x, y }, start));

        let mut child_cursor = start + (extent[slot] - children_span[slot]) / 2.0;
        for &child in forest.children(slot) {
            stack.push((child, x + depth_spacing, child_cursor));
            child_cursor += extent[child] + gap;
        }
    }

    // Normalise so nothing sits above y = 0.
    let min_y = placed
        .iter()
        .flatten()
        .map(|(p, start)| p.y.min(*start))
        .fold(0.0f64, f64::min);
    let shift = if min_y < 0.0 { -min_y } else { 0.0 };

    let mut layout = Layout::default();
    layout.nodes.reserve(n);
    for &slot in forest.preorder() {
        let Some((position, start)) = placed[slot] else {
            continue;
        };
        let position = Position {
            x: position.x,
            y: position.y + shift,
        };
        layout.width = layout.width.max(position.x);
        layout.height = layout.height.max(position.y + own[slot]);
        layout.index.insert(forest.id(slot).to_string(), layout.nodes.len());
        layout.nodes.push(PlacedNode {
            id: forest.id(slot).to_string(),
            position,
            height: own[slot],
            extent: extent[slot],
            span_start: start + shift,
        });
    }
    layout
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
