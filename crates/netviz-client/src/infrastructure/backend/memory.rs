//! In-process authoritative topology.
//!
//! Behaves like the real service: mutations answer with an [`Ack`] only, and
//! every fetch returns a freshly derived snapshot (descendant counts,
//! collapsed-child counts, filtered node and edge lists, bumped revision).
//! It also counts calls per operation and can be told to fail the next N
//! calls of an operation, which is what the store tests are built on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use netviz_core::domain::node::{Edge, Node, NodeType};
use netviz_core::protocol::{
    Ack, LogicDevice, TopologyMetadata, TopologyQuery, TopologySnapshot,
};
use netviz_core::{validate_label, validate_reparent, Forest};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::application::snapshot_store::{BackendError, TopologyBackend};

/// Backend operations, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    Fetch,
    ToggleCollapse,
    UpdateParent,
    UpdateLabel,
    CreateLogicDevice,
    UpdateLogicDevice,
    DeleteLogicDevice,
}

impl BackendOp {
    pub const ALL: [BackendOp; 7] = [
        BackendOp::Fetch,
        BackendOp::ToggleCollapse,
        BackendOp::UpdateParent,
        BackendOp::UpdateLabel,
        BackendOp::CreateLogicDevice,
        BackendOp::UpdateLogicDevice,
        BackendOp::DeleteLogicDevice,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Default)]
struct Topology {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    view_config: serde_json::Value,
    site: Option<String>,
    revision: u64,
    failures: HashMap<BackendOp, usize>,
}

impl Topology {
    fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    fn bump(&mut self) -> Ack {
        self.revision += 1;
        Ack::ok()
    }
}

/// Authoritative topology held in memory.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<Topology>,
    calls: [AtomicUsize; 7],
}

impl InMemoryBackend {
    /// Seeds the backend with `snapshot`.  Derived fields on the incoming
    /// nodes are ignored and recomputed on fetch.
    pub fn new(snapshot: TopologySnapshot) -> Self {
        Self {
            state: Mutex::new(Topology {
                nodes: snapshot.nodes,
                edges: snapshot.edges,
                view_config: snapshot.view_config,
                site: snapshot.metadata.site,
                revision: snapshot.metadata.revision,
                failures: HashMap::new(),
            }),
            calls: Default::default(),
        }
    }

    /// Number of calls made to `op` so far, failed ones included.
    pub fn calls(&self, op: BackendOp) -> usize {
        self.calls[op.index()].load(Ordering::SeqCst)
    }

    /// Total number of mutation calls (everything except fetches).
    pub fn mutation_calls(&self) -> usize {
        BackendOp::ALL
            .iter()
            .filter(|&&op| op != BackendOp::Fetch)
            .map(|&op| self.calls(op))
            .sum()
    }

    /// Makes the next `count` calls to `op` fail with a transport error.
    pub async fn fail_next(&self, op: BackendOp, count: usize) {
        self.state.lock().await.failures.insert(op, count);
    }

    pub async fn revision(&self) -> u64 {
        self.state.lock().await.revision
    }

    /// The full, unfiltered topology with derived fields filled in.
    pub async fn export(&self) -> TopologySnapshot {
        let state = self.state.lock().await;
        derive_snapshot(&state, &TopologyQuery::default())
    }

    /// Replaces the whole topology with `snapshot`.  Call counters and
    /// injected failures are kept.
    pub async fn restore(&self, snapshot: TopologySnapshot) {
        let mut state = self.state.lock().await;
        state.nodes = snapshot.nodes;
        state.edges = snapshot.edges;
        state.view_config = snapshot.view_config;
        state.site = snapshot.metadata.site;
        state.revision = snapshot.metadata.revision;
        debug!(revision = state.revision, "topology restored");
    }

    /// Counts the call and consumes an injected failure, if any.
    async fn enter(&self, op: BackendOp) -> Result<tokio::sync::MutexGuard<'_, Topology>, BackendError> {
        self.calls[op.index()].fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if let Some(remaining) = state.failures.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                warn!(?op, "injected backend failure");
                return Err(BackendError::Transport(format!("injected failure in {op:?}")));
            }
        }
        Ok(state)
    }
}

/// Builds the snapshot a client would receive for `query`.
fn derive_snapshot(state: &Topology, query: &TopologyQuery) -> TopologySnapshot {
    let forest = Forest::build(&state.nodes);
    let counts = forest.descendant_counts();

    let nodes: Vec<Node> = state
        .nodes
        .iter()
        .filter(|n| query.filter.matches(n))
        .map(|n| {
            let mut node = n.clone();
            let (descendants, has_children) = forest
                .slot_of(&n.id)
                .map_or((0, false), |s| (counts[s], !forest.children(s).is_empty()));
            node.descendant_count = descendants;
            node.collapsed_child_count = if node.collapsed && has_children {
                descendants
            } else {
                0
            };
            node
        })
        .collect();

    let present = |id: &str| nodes.iter().any(|n| n.id == id);
    let edges: Vec<Edge> = state
        .edges
        .iter()
        .filter(|e| present(&e.from) && present(&e.to))
        .cloned()
        .collect();

    TopologySnapshot {
        metadata: TopologyMetadata {
            revision: state.revision,
            node_count: nodes.len(),
            edge_count: edges.len(),
            site: state.site.clone(),
            generated_at: None,
        },
        nodes,
        edges,
        view_config: state.view_config.clone(),
    }
}

#[async_trait]
impl TopologyBackend for InMemoryBackend {
    async fn fetch_topology(
        &self,
        query: &TopologyQuery,
    ) -> Result<TopologySnapshot, BackendError> {
        let state = self.enter(BackendOp::Fetch).await?;
        if let (Some(wanted), Some(served)) = (&query.site, &state.site) {
            if wanted != served {
                return Err(BackendError::UnknownSite(wanted.clone()));
            }
        }
        let snapshot = derive_snapshot(&state, query);
        debug!(
            nodes = snapshot.nodes.len(),
            revision = snapshot.metadata.revision,
            "served topology snapshot"
        );
        Ok(snapshot)
    }

    async fn toggle_collapse(&self, node_id: &str, collapsed: bool) -> Result<Ack, BackendError> {
        let mut state = self.enter(BackendOp::ToggleCollapse).await?;
        let Some(node) = state.node_mut(node_id) else {
            return Ok(Ack::rejected(format!("unknown node {node_id}")));
        };
        node.collapsed = collapsed;
        Ok(state.bump())
    }

    async fn update_parent(
        &self,
        node_id: &str,
        new_parent_id: &str,
    ) -> Result<Ack, BackendError> {
        let mut state = self.enter(BackendOp::UpdateParent).await?;
        if let Err(e) = validate_reparent(&Forest::build(&state.nodes), node_id, new_parent_id) {
            return Ok(Ack::rejected(e.to_string()));
        }
        if let Some(node) = state.node_mut(node_id) {
            node.parent_id = Some(new_parent_id.to_string());
        }
        Ok(state.bump())
    }

    async fn update_label(&self, node_id: &str, label: &str) -> Result<Ack, BackendError> {
        let mut state = self.enter(BackendOp::UpdateLabel).await?;
        let label = match validate_label(label) {
            Ok(label) => label.to_string(),
            Err(e) => return Ok(Ack::rejected(e.to_string())),
        };
        let Some(node) = state.node_mut(node_id) else {
            return Ok(Ack::rejected(format!("unknown node {node_id}")));
        };
        node.label = label;
        Ok(state.bump())
    }

    async fn create_logic_device(&self, device: LogicDevice) -> Result<Ack, BackendError> {
        let mut state = self.enter(BackendOp::CreateLogicDevice).await?;
        if state.nodes.iter().any(|n| n.id == device.id) {
            return Ok(Ack::rejected(format!("node {} already exists", device.id)));
        }
        if !state.nodes.iter().any(|n| n.id == device.parent_id) {
            return Ok(Ack::rejected(format!("unknown parent {}", device.parent_id)));
        }
        if let Err(e) = validate_label(&device.label) {
            return Ok(Ack::rejected(e.to_string()));
        }
        state.nodes.push(device.to_node());
        Ok(state.bump())
    }

    async fn update_logic_device(&self, device: LogicDevice) -> Result<Ack, BackendError> {
        let mut state = self.enter(BackendOp::UpdateLogicDevice).await?;
        let forest = Forest::build(&state.nodes);
        let Some(existing) = state.nodes.iter().find(|n| n.id == device.id) else {
            return Ok(Ack::rejected(format!("unknown node {}", device.id)));
        };
        if existing.node_type != NodeType::LogicDevice {
            return Ok(Ack::rejected(format!("{} is not a logic device", device.id)));
        }
        if existing.parent_id.as_deref() != Some(device.parent_id.as_str()) {
            if let Err(e) = validate_reparent(&forest, &device.id, &device.parent_id) {
                return Ok(Ack::rejected(e.to_string()));
            }
        }
        if let Err(e) = validate_label(&device.label) {
            return Ok(Ack::rejected(e.to_string()));
        }
        if let Some(node) = state.node_mut(&device.id) {
            node.label = device.label;
            node.parent_id = Some(device.parent_id);
            node.order = device.order;
        }
        Ok(state.bump())
    }

    async fn delete_logic_device(&self, node_id: &str) -> Result<Ack, BackendError> {
        let mut state = self.enter(BackendOp::DeleteLogicDevice).await?;
        let Some(existing) = state.nodes.iter().find(|n| n.id == node_id) else {
            return Ok(Ack::rejected(format!("unknown node {node_id}")));
        };
        if existing.node_type != NodeType::LogicDevice {
            return Ok(Ack::rejected(format!("{node_id} is not a logic device")));
        }
        let parent = existing.parent_id.clone();
        state.nodes.retain(|n| n.id != node_id);
        for node in &mut state.nodes {
            if node.parent_id.as_deref() == Some(node_id) {
                node.parent_id = parent.clone();
            }
        }
        state.edges.retain(|e| e.from != node_id && e.to != node_id);
        Ok(state.bump())
    }
}
