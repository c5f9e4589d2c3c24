//! Wire types exchanged with the topology backend.
//!
//! The backend speaks JSON.  Reads always return a whole
//! [`TopologySnapshot`]; writes carry one small request each and are answered
//! with an [`Ack`] only.  There are no incremental diffs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::codec::ProtocolError;
use crate::domain::node::{Edge, Node, NodeId, NodeType};

/// Server-side node filter for a topology read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyFilter {
    #[default]
    All,
    Online,
    Offline,
    /// Forwarding devices only (no end clients).
    Infrastructure,
}

impl TopologyFilter {
    /// Returns `true` if `node` passes the filter.  The sentinel root always
    /// passes.
    pub fn matches(self, node: &Node) -> bool {
        if node.is_self_referencing() {
            return true;
        }
        let offline = node.status.as_deref() == Some("offline");
        match self {
            TopologyFilter::All => true,
            TopologyFilter::Online => !offline,
            TopologyFilter::Offline => offline,
            TopologyFilter::Infrastructure => node.node_type.is_infrastructure(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TopologyFilter::All => "all",
            TopologyFilter::Online => "online",
            TopologyFilter::Offline => "offline",
            TopologyFilter::Infrastructure => "infrastructure",
        }
    }
}

impl fmt::Display for TopologyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TopologyFilter {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(TopologyFilter::All),
            "online" => Ok(TopologyFilter::Online),
            "offline" => Ok(TopologyFilter::Offline),
            "infrastructure" => Ok(TopologyFilter::Infrastructure),
            other => Err(ProtocolError::UnknownFilter(other.to_string())),
        }
    }
}

/// Parameters of `GET topology`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyQuery {
    #[serde(default)]
    pub filter: TopologyFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
}

impl TopologyQuery {
    pub fn new(filter: TopologyFilter) -> Self {
        Self { filter, site: None }
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }
}

/// Bookkeeping the backend attaches to a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyMetadata {
    /// Increases on every accepted mutation.
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub node_count: usize,
    #[serde(default)]
    pub edge_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
}

/// Opaque presentation hints shipped with a snapshot.
pub type ViewConfig = serde_json::Value;

/// Full response of `GET topology`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub metadata: TopologyMetadata,
    /// Carried through untouched.
    #[serde(default)]
    pub view_config: ViewConfig,
}

impl TopologySnapshot {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }
}

/// `POST toggle-collapse`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleCollapseRequest {
    pub node_id: NodeId,
    pub collapsed: bool,
}

/// `PUT update-parent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateParentRequest {
    pub node_id: NodeId,
    pub new_parent_id: NodeId,
}

/// `PUT update-label`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLabelRequest {
    pub node_id: NodeId,
    pub label: String,
}

/// Body of `POST` / `PUT logic-device`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicDevice {
    pub id: NodeId,
    pub label: String,
    pub parent_id: NodeId,
    #[serde(default)]
    pub order: i64,
}

impl LogicDevice {
    /// The topology node this device appears as.
    pub fn to_node(&self) -> Node {
        Node::new(
            self.id.clone(),
            self.label.clone(),
            NodeType::LogicDevice,
            Some(self.parent_id.as_str()),
            self.order,
        )
    }
}

/// `DELETE logic-device`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteLogicDeviceRequest {
    pub node_id: NodeId,
}

/// Acknowledgement returned by every mutation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
        }
    }
}
