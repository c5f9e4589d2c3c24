//! TopologyStore: the client-side owner of the topology snapshot.
//!
//! The store is an explicit context object.  It is created with a backend and
//! layout parameters, handed to whoever needs it (usually behind an `Arc`),
//! and torn down with [`TopologyStore::dispose`].
//!
//! # Mutation protocol
//!
//! Every mutation runs the same steps:
//!
//! 1. validate locally; on failure return `Err` without touching the backend;
//! 2. apply a draft of the change to the local snapshot so the view updates
//!    immediately;
//! 3. send the matching backend request;
//! 4. refetch the full snapshot and replace local state wholesale, whether
//!    the request succeeded or not.
//!
//! There is no field-level rollback.  A failed request is corrected by the
//! refetch; if that refetch fails too, the draft is dropped and the last
//! authoritative snapshot stays on screen.
//!
//! # Concurrency
//!
//! The internal state sits behind a `tokio::sync::Mutex` that is released
//! before every backend call, so overlapping operations interleave freely.
//! Each refetch is stamped by a [`SequenceCounter`]; whichever response lands
//! last is applied, even when it was requested first.  Such stale landings are
//! counted and logged.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use netviz_core::domain::node::{Node, NodeId, NodeType};
use netviz_core::protocol::{
    Ack, LogicDevice, ProtocolError, SequenceCounter, TopologyQuery, TopologySnapshot,
};
use netviz_core::{
    project, validate_label, validate_reparent, CollapseSet, Forest, LabelError, LayoutParams,
    ReparentError, TopologyView,
};
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Number of state transitions kept for inspection.
const HISTORY_LIMIT: usize = 64;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failure reported by a [`TopologyBackend`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    /// The request could not be delivered or answered.
    #[error("transport error: {0}")]
    Transport(String),

    /// The requested site is not served by this backend.
    #[error("unknown site: {0}")]
    UnknownSite(String),

    /// Reading or writing a snapshot file failed.
    #[error("I/O error accessing {path}: {message}")]
    Io { path: String, message: String },

    /// A payload could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Errors surfaced at the store boundary.
///
/// Backend failures during a mutation are not errors; they are reported as
/// [`MutationOutcome::Reverted`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error(transparent)]
    InvalidLabel(#[from] LabelError),

    #[error(transparent)]
    InvalidReparent(#[from] ReparentError),

    #[error("node not found: {0}")]
    UnknownNode(NodeId),

    #[error("node {0} has no children to collapse")]
    NothingToCollapse(NodeId),

    #[error("node {0} is not a logic device")]
    NotALogicDevice(NodeId),

    /// A mutation on this node has not finished yet.
    #[error("a change to {0} is still in flight")]
    MutationInFlight(NodeId),

    /// A plain fetch failed.  No state was applied.
    #[error("fetch failed: {0}")]
    Fetch(BackendError),

    #[error("store has been disposed")]
    Disposed,
}

// ── Backend abstraction ───────────────────────────────────────────────────────

/// The topology service the store talks to.
///
/// Reads return a full snapshot; every write returns only an [`Ack`].
/// Infrastructure provides an in-memory and a file-backed implementation;
/// unit tests use the generated `MockTopologyBackend`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TopologyBackend: Send + Sync {
    async fn fetch_topology(&self, query: &TopologyQuery)
        -> Result<TopologySnapshot, BackendError>;

    async fn toggle_collapse(&self, node_id: &str, collapsed: bool) -> Result<Ack, BackendError>;

    async fn update_parent(&self, node_id: &str, new_parent_id: &str)
        -> Result<Ack, BackendError>;

    async fn update_label(&self, node_id: &str, label: &str) -> Result<Ack, BackendError>;

    async fn create_logic_device(&self, device: LogicDevice) -> Result<Ack, BackendError>;

    async fn update_logic_device(&self, device: LogicDevice) -> Result<Ack, BackendError>;

    async fn delete_logic_device(&self, node_id: &str) -> Result<Ack, BackendError>;
}

// ── Public state types ────────────────────────────────────────────────────────

/// Synchronisation state of the store.
///
/// ```text
/// Idle ──mutate──► Mutating ──ack/failure──► Reconciling ──applied──► Idle
/// Idle ──fetch──────────────────────────────► Reconciling
/// any  ──fetch failed──► Error ──retry──► Mutating | Reconciling
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    /// At least one mutation request awaits its acknowledgement.
    Mutating,
    /// A snapshot request is in flight.
    Reconciling,
    /// The most recent fetch failed; see [`TopologyStore::last_error`].
    Error,
}

/// Result of a mutation that passed local validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The backend accepted the change and the refetched snapshot is shown.
    Applied,
    /// The backend refused or failed; local state was replaced by the
    /// backend's view.  Carries the reason.
    Reverted(String),
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied)
    }
}

// ── Internal state ────────────────────────────────────────────────────────────

/// A change on its way to the backend.
#[derive(Debug, Clone)]
enum Mutation {
    ToggleCollapse { node_id: NodeId, collapsed: bool },
    UpdateLabel { node_id: NodeId, label: String },
    UpdateParent { node_id: NodeId, new_parent_id: NodeId },
    CreateLogicDevice(LogicDevice),
    UpdateLogicDevice(LogicDevice),
    DeleteLogicDevice { node_id: NodeId },
}

impl Mutation {
    fn node_id(&self) -> &str {
        match self {
            Mutation::ToggleCollapse { node_id, .. }
            | Mutation::UpdateLabel { node_id, .. }
            | Mutation::UpdateParent { node_id, .. }
            | Mutation::DeleteLogicDevice { node_id } => node_id,
            Mutation::CreateLogicDevice(device) | Mutation::UpdateLogicDevice(device) => {
                &device.id
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Mutation::ToggleCollapse { .. } => "toggle_collapse",
            Mutation::UpdateLabel { .. } => "update_label",
            Mutation::UpdateParent { .. } => "update_parent",
            Mutation::CreateLogicDevice(_) => "create_logic_device",
            Mutation::UpdateLogicDevice(_) => "update_logic_device",
            Mutation::DeleteLogicDevice { .. } => "delete_logic_device",
        }
    }

    /// Applies the optimistic draft of this change.
    fn apply_draft(&self, snapshot: &mut TopologySnapshot, collapsed: &mut CollapseSet) {
        match self {
            Mutation::ToggleCollapse { node_id, collapsed: value } => {
                if *value {
                    collapsed.insert(node_id.clone());
                } else {
                    collapsed.remove(node_id);
                }
                if let Some(node) = snapshot.node_mut(node_id) {
                    node.collapsed = *value;
                }
            }
            Mutation::UpdateLabel { node_id, label } => {
                if let Some(node) = snapshot.node_mut(node_id) {
                    node.label = label.clone();
                }
            }
            Mutation::UpdateParent { node_id, new_parent_id } => {
                if let Some(node) = snapshot.node_mut(node_id) {
                    node.parent_id = Some(new_parent_id.clone());
                }
            }
            Mutation::CreateLogicDevice(device) => snapshot.nodes.push(device.to_node()),
            Mutation::UpdateLogicDevice(device) => {
                if let Some(node) = snapshot.node_mut(&device.id) {
                    node.label = device.label.clone();
                    node.parent_id = Some(device.parent_id.clone());
                    node.order = device.order;
                }
            }
            Mutation::DeleteLogicDevice { node_id } => {
                let parent = snapshot.node(node_id).and_then(|n| n.parent_id.clone());
                snapshot.nodes.retain(|n| &n.id != node_id);
                for node in &mut snapshot.nodes {
                    if node.parent_id.as_deref() == Some(node_id.as_str()) {
                        node.parent_id = parent.clone();
                    }
                }
                collapsed.remove(node_id);
            }
        }
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    /// Last snapshot received from the backend.
    authoritative: TopologySnapshot,
    /// What the view shows: `authoritative` plus any drafts.
    current: TopologySnapshot,
    collapsed: CollapseSet,
    query: TopologyQuery,
    state: SyncState,
    history: Vec<SyncState>,
    awaiting_ack: usize,
    failed: bool,
    last_error: Option<String>,
    last_applied: u64,
    stale_landings: u64,
    pending: HashSet<NodeId>,
}

impl StoreInner {
    fn new() -> Self {
        Self {
            history: vec![SyncState::Idle],
            ..Self::default()
        }
    }

    fn forest(&self) -> Forest {
        Forest::build(&self.current.nodes)
    }

    fn ensure_not_pending(&self, node_id: &str) -> Result<(), StoreError> {
        if self.pending.contains(node_id) {
            return Err(StoreError::MutationInFlight(node_id.to_string()));
        }
        Ok(())
    }

    fn logic_device(&self, node_id: &str) -> Result<&Node, StoreError> {
        let node = self
            .current
            .node(node_id)
            .ok_or_else(|| StoreError::UnknownNode(node_id.to_string()))?;
        if node.node_type != NodeType::LogicDevice {
            return Err(StoreError::NotALogicDevice(node_id.to_string()));
        }
        Ok(node)
    }

    fn discard_drafts(&mut self) {
        self.current = self.authoritative.clone();
        self.collapsed = CollapseSet::from_nodes(&self.current.nodes);
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Owner of the topology snapshot, its drafts and the collapse set.
pub struct TopologyStore {
    backend: Arc<dyn TopologyBackend>,
    params: LayoutParams,
    sequence: SequenceCounter,
    fetching: AtomicUsize,
    disposed: AtomicBool,
    inner: Mutex<StoreInner>,
}

impl TopologyStore {
    /// Creates an empty store.  Nothing is fetched until [`Self::fetch`].
    pub fn new(backend: Arc<dyn TopologyBackend>, params: LayoutParams) -> Self {
        Self {
            backend,
            params,
            sequence: SequenceCounter::new(),
            fetching: AtomicUsize::new(0),
            disposed: AtomicBool::new(false),
            inner: Mutex::new(StoreInner::new()),
        }
    }

    /// Releases all state.  Every later call fails with
    /// [`StoreError::Disposed`] and responses still in flight are dropped.
    pub async fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        let mut inner = self.inner.lock().await;
        *inner = StoreInner::new();
        info!("topology store disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// `true` while at least one snapshot request is in flight.
    pub fn is_loading(&self) -> bool {
        self.fetching.load(Ordering::SeqCst) > 0
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    /// Fetches a fresh snapshot for `query` and replaces local state with it.
    ///
    /// `query` is remembered and reused by the refetches that follow
    /// mutations.
    ///
    /// # Errors
    ///
    /// [`StoreError::Fetch`] if the backend fails; the error is also kept in
    /// [`Self::last_error`] and no state is applied.
    pub async fn fetch(&self, query: TopologyQuery) -> Result<(), StoreError> {
        self.ensure_live()?;
        self.inner.lock().await.query = query;
        self.refetch(false).await
    }

    /// Positioned projection of the current (possibly drafted) state.
    pub async fn view(&self) -> TopologyView {
        let inner = self.inner.lock().await;
        project(
            &inner.current.nodes,
            &inner.current.edges,
            &inner.collapsed,
            &self.params,
        )
    }

    /// Forest built from the current (possibly drafted) state.
    pub async fn forest(&self) -> Forest {
        self.inner.lock().await.forest()
    }

    /// The current (possibly drafted) snapshot.
    pub async fn snapshot(&self) -> TopologySnapshot {
        self.inner.lock().await.current.clone()
    }

    pub async fn collapsed(&self) -> CollapseSet {
        self.inner.lock().await.collapsed.clone()
    }

    pub async fn query(&self) -> TopologyQuery {
        self.inner.lock().await.query.clone()
    }

    pub async fn state(&self) -> SyncState {
        self.inner.lock().await.state
    }

    /// States visited so far, oldest first, starting with `Idle`.
    pub async fn history(&self) -> Vec<SyncState> {
        self.inner.lock().await.history.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.inner.lock().await.last_error.clone()
    }

    /// Number of snapshots that landed after a newer one had been applied.
    pub async fn stale_landings(&self) -> u64 {
        self.inner.lock().await.stale_landings
    }

    /// `true` if a mutation on `node_id` has not finished yet.
    pub async fn is_pending(&self, node_id: &str) -> bool {
        self.inner.lock().await.pending.contains(node_id)
    }

    // ── Mutations ─────────────────────────────────────────────────────────────

    /// Flips the collapse state of `node_id`.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownNode`], or [`StoreError::NothingToCollapse`] when
    /// collapsing a node without children.
    pub async fn toggle_collapse(&self, node_id: &str) -> Result<MutationOutcome, StoreError> {
        self.ensure_live()?;
        let inner = self.inner.lock().await;
        inner.ensure_not_pending(node_id)?;
        let forest = inner.forest();
        let slot = forest
            .slot_of(node_id)
            .ok_or_else(|| StoreError::UnknownNode(node_id.to_string()))?;
        let collapsed = !inner.collapsed.contains(node_id);
        if collapsed && forest.children(slot).is_empty() {
            return Err(StoreError::NothingToCollapse(node_id.to_string()));
        }
        let mutation = Mutation::ToggleCollapse {
            node_id: node_id.to_string(),
            collapsed,
        };
        Ok(self.submit(inner, mutation).await)
    }

    /// Renames `node_id`.  The label is trimmed before it is sent.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidLabel`] or [`StoreError::UnknownNode`].
    pub async fn update_label(
        &self,
        node_id: &str,
        label: &str,
    ) -> Result<MutationOutcome, StoreError> {
        self.ensure_live()?;
        let label = validate_label(label)?;
        let inner = self.inner.lock().await;
        inner.ensure_not_pending(node_id)?;
        if !inner.current.contains(node_id) {
            return Err(StoreError::UnknownNode(node_id.to_string()));
        }
        let mutation = Mutation::UpdateLabel {
            node_id: node_id.to_string(),
            label: label.to_string(),
        };
        Ok(self.submit(inner, mutation).await)
    }

    /// Moves `node_id` under `new_parent_id`.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidReparent`] when the move would create a cycle,
    /// move the sentinel, or reference unknown nodes.
    pub async fn update_parent(
        &self,
        node_id: &str,
        new_parent_id: &str,
    ) -> Result<MutationOutcome, StoreError> {
        self.ensure_live()?;
        let inner = self.inner.lock().await;
        inner.ensure_not_pending(node_id)?;
        validate_reparent(&inner.forest(), node_id, new_parent_id)?;
        let mutation = Mutation::UpdateParent {
            node_id: node_id.to_string(),
            new_parent_id: new_parent_id.to_string(),
        };
        Ok(self.submit(inner, mutation).await)
    }

    /// Creates a logic device under `parent_id`, placed after its existing
    /// children.  Returns the generated id with the outcome.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidLabel`], or [`StoreError::InvalidReparent`] when
    /// the parent does not exist.
    pub async fn create_logic_device(
        &self,
        label: &str,
        parent_id: &str,
    ) -> Result<(NodeId, MutationOutcome), StoreError> {
        self.ensure_live()?;
        let label = validate_label(label)?;
        let inner = self.inner.lock().await;
        let forest = inner.forest();
        let parent = forest
            .slot_of(parent_id)
            .ok_or_else(|| ReparentError::UnknownParent(parent_id.to_string()))?;
        let order = forest
            .children(parent)
            .iter()
            .map(|&c| forest.order(c))
            .max()
            .map_or(0, |max| max.saturating_add(1));

        let device = LogicDevice {
            id: format!("logic-{}", Uuid::new_v4()),
            label: label.to_string(),
            parent_id: parent_id.to_string(),
            order,
        };
        let id = device.id.clone();
        let outcome = self.submit(inner, Mutation::CreateLogicDevice(device)).await;
        Ok((id, outcome))
    }

    /// Replaces the label, parent and order of an existing logic device.
    ///
    /// A parent change goes through the same cycle check as
    /// [`Self::update_parent`].
    ///
    /// # Errors
    ///
    /// [`StoreError::NotALogicDevice`], [`StoreError::InvalidLabel`] or
    /// [`StoreError::InvalidReparent`].
    pub async fn update_logic_device(
        &self,
        device: LogicDevice,
    ) -> Result<MutationOutcome, StoreError> {
        self.ensure_live()?;
        let label = validate_label(&device.label)?.to_string();
        let inner = self.inner.lock().await;
        inner.ensure_not_pending(&device.id)?;
        let existing = inner.logic_device(&device.id)?;
        if existing.parent_id.as_deref() != Some(device.parent_id.as_str()) {
            validate_reparent(&inner.forest(), &device.id, &device.parent_id)?;
        }
        let device = LogicDevice { label, ..device };
        Ok(self.submit(inner, Mutation::UpdateLogicDevice(device)).await)
    }

    /// Deletes a logic device.  Its children move up to its parent.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownNode`] or [`StoreError::NotALogicDevice`].
    pub async fn delete_logic_device(&self, node_id: &str) -> Result<MutationOutcome, StoreError> {
        self.ensure_live()?;
        let inner = self.inner.lock().await;
        inner.ensure_not_pending(node_id)?;
        inner.logic_device(node_id)?;
        let mutation = Mutation::DeleteLogicDevice {
            node_id: node_id.to_string(),
        };
        Ok(self.submit(inner, mutation).await)
    }

    // ── Private helpers ───────────────────────────────────────────────────────

    fn ensure_live(&self) -> Result<(), StoreError> {
        if self.is_disposed() {
            return Err(StoreError::Disposed);
        }
        Ok(())
    }

    /// Drafts, sends and reconciles one validated mutation.
    ///
    /// Takes the guard the caller validated under, so nothing can change
    /// between validation and the draft.
    async fn submit(
        &self,
        mut inner: MutexGuard<'_, StoreInner>,
        mutation: Mutation,
    ) -> MutationOutcome {
        let node_id = mutation.node_id().to_string();
        inner.pending.insert(node_id.clone());
        {
            let StoreInner {
                current, collapsed, ..
            } = &mut *inner;
            mutation.apply_draft(current, collapsed);
        }
        inner.awaiting_ack += 1;
        self.settle(&mut inner);
        drop(inner);

        debug!(kind = mutation.kind(), node_id = %node_id, "mutation sent");
        let mut outcome = match self.send(&mutation).await {
            Ok(ack) if ack.ok => MutationOutcome::Applied,
            Ok(ack) => MutationOutcome::Reverted(
                ack.message
                    .unwrap_or_else(|| "rejected by backend".to_string()),
            ),
            Err(e) => MutationOutcome::Reverted(e.to_string()),
        };
        match &outcome {
            MutationOutcome::Applied => {
                info!(kind = mutation.kind(), node_id = %node_id, "mutation acknowledged")
            }
            MutationOutcome::Reverted(reason) => {
                warn!(kind = mutation.kind(), node_id = %node_id, %reason, "mutation failed, reconciling")
            }
        }

        let refetched = self.refetch(true).await;

        let mut inner = self.inner.lock().await;
        inner.pending.remove(&node_id);
        match refetched {
            Ok(()) => {}
            Err(StoreError::Disposed) => {
                outcome = MutationOutcome::Reverted(StoreError::Disposed.to_string());
            }
            Err(e) => {
                warn!(node_id = %node_id, error = %e, "corrective refetch failed, dropping draft");
                inner.discard_drafts();
                outcome = MutationOutcome::Reverted(match outcome {
                    MutationOutcome::Applied => e.to_string(),
                    MutationOutcome::Reverted(reason) => format!("{reason}; {e}"),
                });
            }
        }
        outcome
    }

    async fn send(&self, mutation: &Mutation) -> Result<Ack, BackendError> {
        match mutation {
            Mutation::ToggleCollapse { node_id, collapsed } => {
                self.backend.toggle_collapse(node_id, *collapsed).await
            }
            Mutation::UpdateLabel { node_id, label } => {
                self.backend.update_label(node_id, label).await
            }
            Mutation::UpdateParent {
                node_id,
                new_parent_id,
            } => self.backend.update_parent(node_id, new_parent_id).await,
            Mutation::CreateLogicDevice(device) => {
                self.backend.create_logic_device(device.clone()).await
            }
            Mutation::UpdateLogicDevice(device) => {
                self.backend.update_logic_device(device.clone()).await
            }
            Mutation::DeleteLogicDevice { node_id } => {
                self.backend.delete_logic_device(node_id).await
            }
        }
    }

    /// Requests a full snapshot and applies whatever lands.
    ///
    /// With `after_ack` set, the caller's acknowledgement is retired in the
    /// same critical section that starts the fetch, which is the
    /// `Mutating → Reconciling` edge.
    async fn refetch(&self, after_ack: bool) -> Result<(), StoreError> {
        let (seq, query) = {
            let mut inner = self.inner.lock().await;
            if after_ack {
                inner.awaiting_ack = inner.awaiting_ack.saturating_sub(1);
            }
            if self.is_disposed() {
                return Err(StoreError::Disposed);
            }
            self.fetching.fetch_add(1, Ordering::SeqCst);
            let seq = self.sequence.next();
            self.settle(&mut inner);
            (seq, inner.query.clone())
        };
        debug!(seq, filter = %query.filter, "snapshot requested");

        let result = self.backend.fetch_topology(&query).await;

        let mut inner = self.inner.lock().await;
        self.fetching.fetch_sub(1, Ordering::SeqCst);
        if self.is_disposed() {
            debug!(seq, "dropping snapshot that landed after dispose");
            return Err(StoreError::Disposed);
        }
        let outcome = match result {
            Ok(snapshot) => {
                self.land(&mut inner, seq, snapshot);
                Ok(())
            }
            Err(e) => {
                error!(seq, error = %e, "snapshot fetch failed");
                inner.failed = true;
                inner.last_error = Some(e.to_string());
                Err(StoreError::Fetch(e))
            }
        };
        self.settle(&mut inner);
        outcome
    }

    /// Applies a landed snapshot wholesale.
    fn land(&self, inner: &mut StoreInner, seq: u64, snapshot: TopologySnapshot) {
        if seq < inner.last_applied {
            inner.stale_landings += 1;
            warn!(
                seq,
                newest = inner.last_applied,
                "older snapshot landed after a newer one, applying it"
            );
        }
        inner.last_applied = inner.last_applied.max(seq);
        info!(
            seq,
            nodes = snapshot.nodes.len(),
            revision = snapshot.metadata.revision,
            "snapshot applied"
        );
        inner.collapsed = CollapseSet::from_nodes(&snapshot.nodes);
        inner.current = snapshot.clone();
        inner.authoritative = snapshot;
        inner.failed = false;
        inner.last_error = None;
    }

    /// Derives the sync state from the in-flight counters and records the
    /// transition if it changed.
    fn settle(&self, inner: &mut StoreInner) {
        let next = if inner.awaiting_ack > 0 {
            SyncState::Mutating
        } else if self.fetching.load(Ordering::SeqCst) > 0 {
            SyncState::Reconciling
        } else if inner.failed {
            SyncState::Error
        } else {
            SyncState::Idle
        };
        if next == inner.state {
            return;
        }
        debug!(from = ?inner.state, to = ?next, "sync state changed");
        inner.state = next;
        inner.history.push(next);
        if inner.history.len() > HISTORY_LIMIT {
            let excess = inner.history.len() - HISTORY_LIMIT;
            inner.history.drain(..excess);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
