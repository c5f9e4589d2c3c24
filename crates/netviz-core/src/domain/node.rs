//! Topology node and edge entities.
//!
//! A node carries no coordinates.  Its place in the picture is derived from
//! `parent_id` and `order` alone; see [`crate::domain::tree`] and
//! [`crate::domain::layout`].

use serde::{Deserialize, Serialize};

/// Unique identifier of a topology node as issued by the backend.
pub type NodeId = String;

/// Closed set of device categories the viewer knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// The virtual boundary root ("the internet").
    Internet,
    Router,
    Gateway,
    Switch,
    AccessPoint,
    Server,
    Client,
    /// A user-defined grouping node that has no physical counterpart.
    LogicDevice,
    /// Sensor / edge device reporting through an Aranea controller.
    Aranea,
    #[serde(other)]
    Unknown,
}

impl NodeType {
    /// All variants, in declaration order.
    pub const ALL: [NodeType; 10] = [
        NodeType::Internet,
        NodeType::Router,
        NodeType::Gateway,
        NodeType::Switch,
        NodeType::AccessPoint,
        NodeType::Server,
        NodeType::Client,
        NodeType::LogicDevice,
        NodeType::Aranea,
        NodeType::Unknown,
    ];

    /// Returns the snake_case name used on the wire and in config files.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Internet => "internet",
            NodeType::Router => "router",
            NodeType::Gateway => "gateway",
            NodeType::Switch => "switch",
            NodeType::AccessPoint => "access_point",
            NodeType::Server => "server",
            NodeType::Client => "client",
            NodeType::LogicDevice => "logic_device",
            NodeType::Aranea => "aranea",
            NodeType::Unknown => "unknown",
        }
    }

    /// Returns `true` for devices that forward traffic for other devices.
    pub fn is_infrastructure(self) -> bool {
        matches!(
            self,
            NodeType::Internet
                | NodeType::Router
                | NodeType::Gateway
                | NodeType::Switch
                | NodeType::AccessPoint
                | NodeType::LogicDevice
        )
    }
}

/// A device (or virtual grouping) in the topology snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub node_type: NodeType,
    /// Parent reference.  May be absent or dangle; equal to `id` only for the
    /// sentinel root.
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    /// Sibling sort key.  Ties are broken by `id`.
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub collapsed: bool,
    /// Derived by whoever produced the snapshot.  The viewer recomputes it.
    #[serde(default)]
    pub descendant_count: usize,
    /// Derived by whoever produced the snapshot.  The viewer recomputes it.
    #[serde(default)]
    pub collapsed_child_count: usize,
    /// Reserved: never consulted by the layout engine.
    #[serde(default)]
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
}

impl Node {
    /// Creates a node with the given identity and placement; every other
    /// field takes its default.
    pub fn new(
        id: impl Into<NodeId>,
        label: impl Into<String>,
        node_type: NodeType,
        parent_id: Option<&str>,
        order: i64,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            node_type,
            parent_id: parent_id.map(str::to_string),
            order,
            collapsed: false,
            descendant_count: 0,
            collapsed_child_count: 0,
            pinned: false,
            status: None,
            ip: None,
            mac: None,
        }
    }

    /// Creates the self-referencing sentinel root.
    pub fn sentinel(id: impl Into<NodeId>, label: impl Into<String>) -> Self {
        let id = id.into();
        let parent = id.clone();
        let mut node = Self::new(id, label, NodeType::Internet, None, 0);
        node.parent_id = Some(parent);
        node
    }

    /// Returns `true` if this node references itself as its own parent.
    pub fn is_self_referencing(&self) -> bool {
        self.parent_id.as_deref() == Some(self.id.as_str())
    }
}

/// Kind of link drawn between a parent and a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Wired,
    Wireless,
    Logical,
    /// Synthetic link from the sentinel to an orphan.
    Detached,
}

/// A parent → child link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub edge_type: EdgeType,
}
