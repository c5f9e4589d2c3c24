//! Presentation projection: the visible, positioned topology.
//!
//! [`project`] chains the pipeline
//!
//! ```text
//! nodes ──► Forest::build ──► compute_visible ──► subforest(visible) ──► compute_layout
//! ```
//!
//! and packages the result for a renderer.  It is a pure function of its
//! arguments; the raw node list is never modified.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use super::layout::{compute_layout, LayoutParams};
use super::node::{Edge, Node, NodeId, NodeType};
use super::tree::{BrokenLink, Forest};
use super::visibility::{compute_visible, CollapseSet};

/// A visible node with its computed position and derived counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewNode {
    pub id: NodeId,
    pub label: String,
    pub node_type: NodeType,
    pub x: f64,
    pub y: f64,
    pub height: f64,
    pub depth: usize,
    pub descendant_count: usize,
    pub collapsed_child_count: usize,
    pub is_collapsed: bool,
    pub is_orphan: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopologyView {
    /// Visible nodes in pre-order.
    nodes: Vec<ViewNode>,
    #[serde(skip)]
    index: HashMap<NodeId, usize>,
    pub edges: Vec<Edge>,
    pub width: f64,
    pub height: f64,
    pub hidden_count: usize,
    pub broken_links: Vec<BrokenLink>,
}

impl TopologyView {
    /// Visible nodes in pre-order.
    pub fn nodes(&self) -> &[ViewNode] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&ViewNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.node(id).is_some()
    }
}

/// Builds the visible, positioned projection of `nodes`.
///
/// `edge_hints` are the backend's edges; they only contribute edge types.
pub fn project(
    nodes: &[Node],
    edge_hints: &[Edge],
    collapsed: &CollapseSet,
    params: &LayoutParams,
) -> TopologyView {
    let forest = Forest::build(nodes);
    let visibility = compute_visible(&forest, collapsed);
    let visible_forest = forest.subforest(visibility.mask());
    let layout = compute_layout(&visible_forest, params);

    let mut by_id: HashMap<&str, &Node> = HashMap::with_capacity(nodes.len());
    for node in nodes {
        by_id.entry(node.id.as_str()).or_insert(node);
    }

    let view_nodes: Vec<ViewNode> = layout
        .iter()
        .filter_map(|placed| {
            let slot = forest.slot_of(&placed.id)?;
            let node = by_id.get(placed.id.as_str())?;
            Some(ViewNode {
                id: placed.id.clone(),
                label: node.label.clone(),
                node_type: node.node_type,
                x: placed.position.x,
                y: placed.position.y,
                height: placed.height,
                depth: forest.depth(slot),
                descendant_count: visibility.descendant_count(slot),
                collapsed_child_count: visibility.collapsed_child_count(slot),
                is_collapsed: visibility.is_collapsed(slot),
                is_orphan: forest.is_orphan(slot),
                status: node.status.clone(),
            })
        })
        .collect();

    let edges = visibility.visible_edges(&forest, &forest.edges(edge_hints));
    debug!(
        visible = view_nodes.len(),
        hidden = visibility.hidden_count(),
        edges = edges.len(),
        "topology projected"
    );

    let index = view_nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.clone(), i))
        .collect();

    TopologyView {
        nodes: view_nodes,
        index,
        edges,
        width: layout.width(),
        height: layout.height(),
        hidden_count: visibility.hidden_count(),
        broken_links: forest.broken_links().to_vec(),
    }
}
