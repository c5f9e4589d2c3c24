//! Integration tests for the topology store.
//!
//! These tests drive `TopologyStore` and `TopologySession` against the
//! in-memory backend, which behaves like the real service (ack-only writes,
//! derived snapshots on read).  `GatedBackend` wraps it to hold fetch
//! responses back so that overlapping operations can be ordered by hand.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use netviz_client::application::snapshot_store::{
    BackendError, MutationOutcome, StoreError, SyncState, TopologyBackend, TopologyStore,
};
use netviz_client::{BackendOp, DragMode, InMemoryBackend, TopologySession};
use netviz_core::protocol::{Ack, LogicDevice, TopologyQuery, TopologySnapshot};
use netviz_core::{LabelError, LayoutParams, Node, NodeType, Position, ReparentError};
use tokio::sync::oneshot;

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn topology() -> TopologySnapshot {
    TopologySnapshot {
        nodes: vec![
            Node::sentinel("root", "Internet"),
            Node::new("gateway", "Gateway", NodeType::Gateway, Some("root"), 0),
            Node::new("switch", "Switch", NodeType::Switch, Some("gateway"), 0),
            Node::new("ap", "AP", NodeType::AccessPoint, Some("gateway"), 1),
            Node::new("pc", "PC", NodeType::Client, Some("switch"), 0),
            Node::new("nas", "NAS", NodeType::Server, Some("root"), 1),
        ],
        ..TopologySnapshot::default()
    }
}

async fn loaded(backend: Arc<InMemoryBackend>) -> Arc<TopologyStore> {
    let store = Arc::new(TopologyStore::new(backend, LayoutParams::default()));
    store
        .fetch(TopologyQuery::default())
        .await
        .expect("initial fetch must succeed");
    store
}

async fn label_of(store: &TopologyStore, id: &str) -> String {
    store
        .snapshot()
        .await
        .node(id)
        .map(|n| n.label.clone())
        .expect("node must exist")
}

/// Backend whose fetches can be parked until the test releases them.
///
/// The snapshot is read from the inner backend before parking, so a released
/// response carries the state as it was when the request arrived.
struct GatedBackend {
    inner: InMemoryBackend,
    gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    parked: AtomicUsize,
}

impl GatedBackend {
    fn new(snapshot: TopologySnapshot) -> Self {
        Self {
            inner: InMemoryBackend::new(snapshot),
            gates: Mutex::new(VecDeque::new()),
            parked: AtomicUsize::new(0),
        }
    }

    /// Parks the next ungated fetch until the returned sender fires.
    fn gate_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().push_back(rx);
        tx
    }

    fn parked(&self) -> usize {
        self.parked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TopologyBackend for GatedBackend {
    async fn fetch_topology(
        &self,
        query: &TopologyQuery,
    ) -> Result<TopologySnapshot, BackendError> {
        let result = self.inner.fetch_topology(query).await;
        let gate = self.gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            self.parked.fetch_add(1, Ordering::SeqCst);
            let _ = gate.await;
        }
        result
    }

    async fn toggle_collapse(&self, node_id: &str, collapsed: bool) -> Result<Ack, BackendError> {
        self.inner.toggle_collapse(node_id, collapsed).await
    }

    async fn update_parent(
        &self,
        node_id: &str,
        new_parent_id: &str,
    ) -> Result<Ack, BackendError> {
        self.inner.update_parent(node_id, new_parent_id).await
    }

    async fn update_label(&self, node_id: &str, label: &str) -> Result<Ack, BackendError> {
        self.inner.update_label(node_id, label).await
    }

    async fn create_logic_device(&self, device: LogicDevice) -> Result<Ack, BackendError> {
        self.inner.create_logic_device(device).await
    }

    async fn update_logic_device(&self, device: LogicDevice) -> Result<Ack, BackendError> {
        self.inner.update_logic_device(device).await
    }

    async fn delete_logic_device(&self, node_id: &str) -> Result<Ack, BackendError> {
        self.inner.delete_logic_device(node_id).await
    }
}

async fn wait_until_parked(backend: &GatedBackend, count: usize) {
    for _ in 0..10_000 {
        if backend.parked() >= count {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("expected {count} parked fetches, saw {}", backend.parked());
}

// ── Label edits ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_labels_never_reach_the_backend() {
    // Arrange
    let backend = Arc::new(InMemoryBackend::new(topology()));
    let store = loaded(Arc::clone(&backend)).await;
    let too_long = "x".repeat(51);

    // Act
    let empty = store.update_label("gateway", "").await;
    let blank = store.update_label("gateway", "   ").await;
    let long = store.update_label("gateway", &too_long).await;

    // Assert
    assert_eq!(empty, Err(StoreError::InvalidLabel(LabelError::Empty)));
    assert_eq!(blank, Err(StoreError::InvalidLabel(LabelError::Empty)));
    assert!(matches!(
        long,
        Err(StoreError::InvalidLabel(LabelError::TooLong { len: 51, .. }))
    ));
    assert_eq!(backend.mutation_calls(), 0);
    assert_eq!(backend.calls(BackendOp::Fetch), 1, "only the initial fetch");
    assert_eq!(label_of(&store, "gateway").await, "Gateway");
}

#[tokio::test]
async fn test_valid_label_sends_one_mutation_and_one_refetch() {
    // Arrange
    let backend = Arc::new(InMemoryBackend::new(topology()));
    let store = loaded(Arc::clone(&backend)).await;

    // Act
    let outcome = store.update_label("gateway", "  Core Router  ").await;

    // Assert
    assert_eq!(outcome, Ok(MutationOutcome::Applied));
    assert_eq!(backend.calls(BackendOp::UpdateLabel), 1);
    assert_eq!(backend.calls(BackendOp::Fetch), 2);
    assert_eq!(label_of(&store, "gateway").await, "Core Router");
    assert_eq!(store.state().await, SyncState::Idle);
    assert_eq!(
        store.history().await,
        vec![
            SyncState::Idle,
            SyncState::Reconciling,
            SyncState::Idle,
            SyncState::Mutating,
            SyncState::Reconciling,
            SyncState::Idle,
        ]
    );
}

// ── Reparenting ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_reparent_into_own_subtree_is_rejected_locally() {
    // Arrange
    let backend = Arc::new(InMemoryBackend::new(topology()));
    let store = loaded(Arc::clone(&backend)).await;

    // Act
    let into_child = store.update_parent("gateway", "switch").await;
    let into_grandchild = store.update_parent("gateway", "pc").await;
    let onto_self = store.update_parent("gateway", "gateway").await;
    let sentinel = store.update_parent("root", "nas").await;

    // Assert
    assert!(matches!(
        into_child,
        Err(StoreError::InvalidReparent(ReparentError::WouldCreateCycle { .. }))
    ));
    assert!(matches!(
        into_grandchild,
        Err(StoreError::InvalidReparent(ReparentError::WouldCreateCycle { .. }))
    ));
    assert!(matches!(
        onto_self,
        Err(StoreError::InvalidReparent(ReparentError::SelfParent(_)))
    ));
    assert_eq!(
        sentinel,
        Err(StoreError::InvalidReparent(ReparentError::SentinelImmovable))
    );
    assert_eq!(backend.mutation_calls(), 0);
    assert_eq!(backend.calls(BackendOp::Fetch), 1);
}

#[tokio::test]
async fn test_drop_onto_descendant_is_rejected_without_backend_calls() {
    // Arrange
    let backend = Arc::new(InMemoryBackend::new(topology()));
    let mut session = TopologySession::new(loaded(Arc::clone(&backend)).await);
    session
        .interaction_mut()
        .begin_drag("gateway", DragMode::Reparent);

    // Act
    let result = session.drop_on("pc").await;

    // Assert
    assert!(matches!(
        result,
        Err(StoreError::InvalidReparent(ReparentError::WouldCreateCycle { .. }))
    ));
    assert_eq!(backend.mutation_calls(), 0);
    assert!(session.interaction().drag().is_none(), "drag must be over");
}

#[tokio::test]
async fn test_valid_drop_moves_subtree_and_relayouts() {
    // Arrange
    let backend = Arc::new(InMemoryBackend::new(topology()));
    let mut session = TopologySession::new(loaded(Arc::clone(&backend)).await);
    session
        .interaction_mut()
        .begin_drag("switch", DragMode::Reparent);

    // Act
    let outcome = session.drop_on("nas").await;

    // Assert
    assert_eq!(outcome, Ok(Some(MutationOutcome::Applied)));
    let view = session.view().await;
    assert_eq!(view.node("switch").unwrap().depth, 2);
    assert_eq!(view.node("pc").unwrap().depth, 3);
    assert!(view.node("pc").unwrap().x > view.node("nas").unwrap().x);
    assert_eq!(backend.calls(BackendOp::UpdateParent), 1);
}

#[tokio::test]
async fn test_reorder_drop_joins_the_target_sibling_group() {
    let backend = Arc::new(InMemoryBackend::new(topology()));
    let mut session = TopologySession::new(loaded(Arc::clone(&backend)).await);
    session.interaction_mut().begin_drag("pc", DragMode::Reorder);

    let outcome = session.drop_on("ap").await;

    assert_eq!(outcome, Ok(Some(MutationOutcome::Applied)));
    let snap = session.store().snapshot().await;
    assert_eq!(snap.node("pc").unwrap().parent_id.as_deref(), Some("gateway"));
}

#[tokio::test]
async fn test_reorder_drop_within_own_sibling_group_sends_nothing() {
    // Arrange
    let backend = Arc::new(InMemoryBackend::new(topology()));
    let mut session = TopologySession::new(loaded(Arc::clone(&backend)).await);
    session.interaction_mut().begin_drag("ap", DragMode::Reorder);

    // Act
    let outcome = session.drop_on("switch").await;

    // Assert
    assert_eq!(outcome, Ok(None));
    assert_eq!(backend.mutation_calls(), 0);
    assert_eq!(backend.calls(BackendOp::Fetch), 1);
    assert_eq!(session.store().history().await.last(), Some(&SyncState::Idle));
    assert!(session.interaction().drag().is_none(), "drag must be over");
}

#[tokio::test]
async fn test_drop_without_drag_does_nothing() {
    let backend = Arc::new(InMemoryBackend::new(topology()));
    let mut session = TopologySession::new(loaded(Arc::clone(&backend)).await);

    let outcome = session.drop_on("nas").await;

    assert_eq!(outcome, Ok(None));
    assert_eq!(backend.mutation_calls(), 0);
}

// ── Fetching ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_refetch_without_changes_is_idempotent() {
    // Arrange
    let backend = Arc::new(InMemoryBackend::new(topology()));
    let store = loaded(Arc::clone(&backend)).await;
    let first_view = store.view().await;
    let first_nodes = store.snapshot().await.nodes;

    // Act
    store.fetch(TopologyQuery::default()).await.unwrap();

    // Assert
    assert_eq!(store.view().await, first_view);
    assert_eq!(store.snapshot().await.nodes, first_nodes);
    assert_eq!(store.stale_landings().await, 0);
}

#[tokio::test]
async fn test_collapse_round_trips_through_backend() {
    // Arrange
    let backend = Arc::new(InMemoryBackend::new(topology()));
    let store = loaded(Arc::clone(&backend)).await;
    let expanded = store.view().await;

    // Act
    let collapse = store.toggle_collapse("gateway").await;
    let folded = store.view().await;
    let expand = store.toggle_collapse("gateway").await;

    // Assert
    assert_eq!(collapse, Ok(MutationOutcome::Applied));
    assert_eq!(expand, Ok(MutationOutcome::Applied));
    let gw = folded.node("gateway").unwrap();
    assert!(gw.is_collapsed);
    assert_eq!(gw.collapsed_child_count, 3);
    assert!(!folded.is_visible("switch"));
    assert!(!folded.is_visible("pc"));
    assert_eq!(folded.hidden_count, 3);
    assert_eq!(store.view().await, expanded);
    assert_eq!(backend.calls(BackendOp::ToggleCollapse), 2);
}

#[tokio::test]
async fn test_collapsing_a_leaf_is_rejected_locally() {
    let backend = Arc::new(InMemoryBackend::new(topology()));
    let store = loaded(Arc::clone(&backend)).await;

    let result = store.toggle_collapse("pc").await;

    assert_eq!(result, Err(StoreError::NothingToCollapse("pc".into())));
    assert_eq!(backend.mutation_calls(), 0);
}

#[tokio::test]
async fn test_failed_fetch_keeps_previous_state_and_reports_error() {
    // Arrange
    let backend = Arc::new(InMemoryBackend::new(topology()));
    let store = loaded(Arc::clone(&backend)).await;
    backend.fail_next(BackendOp::Fetch, 1).await;

    // Act
    let result = store.fetch(TopologyQuery::default()).await;

    // Assert
    assert!(matches!(result, Err(StoreError::Fetch(BackendError::Transport(_)))));
    assert_eq!(store.state().await, SyncState::Error);
    assert!(store.last_error().await.is_some());
    assert_eq!(store.snapshot().await.nodes.len(), 6);

    // A retry recovers.
    store.fetch(TopologyQuery::default()).await.unwrap();
    assert_eq!(store.state().await, SyncState::Idle);
    assert!(store.last_error().await.is_none());
}

// ── Failure handling ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failed_mutation_is_reverted_by_the_refetch() {
    // Arrange
    let backend = Arc::new(InMemoryBackend::new(topology()));
    let store = loaded(Arc::clone(&backend)).await;
    backend.fail_next(BackendOp::UpdateLabel, 1).await;

    // Act
    let outcome = store.update_label("gateway", "Edge").await;

    // Assert
    match outcome {
        Ok(MutationOutcome::Reverted(reason)) => assert!(reason.contains("injected")),
        other => panic!("expected a revert, got {other:?}"),
    }
    assert_eq!(label_of(&store, "gateway").await, "Gateway");
    assert_eq!(backend.calls(BackendOp::Fetch), 2, "refetch runs on failure too");
    assert_eq!(store.state().await, SyncState::Idle);
    assert!(!store.is_pending("gateway").await);
}

#[tokio::test]
async fn test_failed_corrective_refetch_drops_the_draft() {
    // Arrange
    let backend = Arc::new(InMemoryBackend::new(topology()));
    let store = loaded(Arc::clone(&backend)).await;
    backend.fail_next(BackendOp::Fetch, 1).await;

    // Act
    let outcome = store.update_label("gateway", "Edge").await;

    // Assert: the backend took the change, but the store could not confirm it.
    assert!(matches!(outcome, Ok(MutationOutcome::Reverted(_))));
    assert_eq!(label_of(&store, "gateway").await, "Gateway");
    assert_eq!(store.state().await, SyncState::Error);

    store.fetch(TopologyQuery::default()).await.unwrap();
    assert_eq!(label_of(&store, "gateway").await, "Edge");
    assert_eq!(store.state().await, SyncState::Idle);
}

// ── Concurrency ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_draft_is_visible_before_the_refetch_lands() {
    // Arrange
    let backend = Arc::new(GatedBackend::new(topology()));
    let store = Arc::new(TopologyStore::new(backend.clone(), LayoutParams::default()));
    store.fetch(TopologyQuery::default()).await.unwrap();
    let release = backend.gate_next();

    // Act
    let task = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.update_label("gateway", "Core").await })
    };
    wait_until_parked(&backend, 1).await;

    // Assert: the draft is shown while the refetch is held back.
    assert_eq!(label_of(&store, "gateway").await, "Core");
    assert_eq!(store.state().await, SyncState::Reconciling);
    assert!(store.is_loading());
    assert!(store.is_pending("gateway").await);

    release.send(()).unwrap();
    assert_eq!(task.await.unwrap(), Ok(MutationOutcome::Applied));
    assert_eq!(store.state().await, SyncState::Idle);
    assert!(!store.is_loading());
}

#[tokio::test]
async fn test_second_mutation_on_busy_node_is_refused_while_others_proceed() {
    // Arrange
    let backend = Arc::new(GatedBackend::new(topology()));
    let store = Arc::new(TopologyStore::new(backend.clone(), LayoutParams::default()));
    store.fetch(TopologyQuery::default()).await.unwrap();
    let release = backend.gate_next();
    let first = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.update_label("gateway", "Core").await })
    };
    wait_until_parked(&backend, 1).await;

    // Act
    let same_node = store.update_label("gateway", "Edge").await;
    let other_node = store.update_label("switch", "Core Switch").await;

    // Assert
    assert_eq!(
        same_node,
        Err(StoreError::MutationInFlight("gateway".into()))
    );
    assert_eq!(other_node, Ok(MutationOutcome::Applied));

    release.send(()).unwrap();
    assert_eq!(first.await.unwrap(), Ok(MutationOutcome::Applied));
    // The held-back refetch was requested first but landed last.
    assert_eq!(store.stale_landings().await, 1);

    store.fetch(TopologyQuery::default()).await.unwrap();
    assert_eq!(label_of(&store, "gateway").await, "Core");
    assert_eq!(label_of(&store, "switch").await, "Core Switch");
}

#[tokio::test]
async fn test_out_of_order_snapshot_is_applied_and_counted() {
    // Arrange
    let backend = Arc::new(GatedBackend::new(topology()));
    let store = Arc::new(TopologyStore::new(backend.clone(), LayoutParams::default()));
    store.fetch(TopologyQuery::default()).await.unwrap();

    let release_old = backend.gate_next();
    let old = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.fetch(TopologyQuery::default()).await })
    };
    wait_until_parked(&backend, 1).await;

    backend.inner.update_label("gateway", "Edge").await.unwrap();
    let release_new = backend.gate_next();
    let new = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.fetch(TopologyQuery::default()).await })
    };
    wait_until_parked(&backend, 2).await;

    // Act: the newer request lands first.
    release_new.send(()).unwrap();
    new.await.unwrap().unwrap();
    let after_new = label_of(&store, "gateway").await;
    release_old.send(()).unwrap();
    old.await.unwrap().unwrap();

    // Assert: last landing wins, even though it is older.
    assert_eq!(after_new, "Edge");
    assert_eq!(label_of(&store, "gateway").await, "Gateway");
    assert_eq!(store.stale_landings().await, 1);
    assert_eq!(store.state().await, SyncState::Idle);
}

#[tokio::test]
async fn test_response_landing_after_dispose_is_dropped() {
    // Arrange
    let backend = Arc::new(GatedBackend::new(topology()));
    let store = Arc::new(TopologyStore::new(backend.clone(), LayoutParams::default()));
    let release = backend.gate_next();
    let pending = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.fetch(TopologyQuery::default()).await })
    };
    wait_until_parked(&backend, 1).await;

    // Act
    store.dispose().await;
    release.send(()).unwrap();
    let result = pending.await.unwrap();

    // Assert
    assert_eq!(result, Err(StoreError::Disposed));
    assert!(store.snapshot().await.nodes.is_empty());
    assert!(!store.is_loading());
    assert_eq!(
        store.update_label("gateway", "Core").await,
        Err(StoreError::Disposed)
    );
}

// ── Logic devices and session reconciliation ──────────────────────────────────

#[tokio::test]
async fn test_logic_device_lifecycle_through_session() {
    // Arrange
    let backend = Arc::new(InMemoryBackend::new(topology()));
    let mut session = TopologySession::new(loaded(Arc::clone(&backend)).await);

    // Act: create under the gateway, after switch and ap.
    let (id, created) = session.create_logic_device("Lab rack", "gateway").await.unwrap();

    // Assert
    assert_eq!(created, MutationOutcome::Applied);
    assert!(id.starts_with("logic-"));
    let snap = session.store().snapshot().await;
    let device = snap.node(&id).unwrap();
    assert_eq!(device.node_type, NodeType::LogicDevice);
    assert_eq!(device.parent_id.as_deref(), Some("gateway"));
    assert_eq!(device.order, 2);

    // Act: group the switch under it, then rename it.
    let moved = session.update_parent("switch", &id).await.unwrap();
    let renamed = session
        .update_logic_device(LogicDevice {
            id: id.clone(),
            label: " Rack A ".into(),
            parent_id: "gateway".into(),
            order: 2,
        })
        .await
        .unwrap();

    // Assert
    assert_eq!(moved, MutationOutcome::Applied);
    assert_eq!(renamed, MutationOutcome::Applied);
    assert_eq!(label_of(session.store(), &id).await, "Rack A");
    assert_eq!(session.view().await.node("pc").unwrap().depth, 4);

    // Arrange: point interaction state at the device.
    session.interaction_mut().select(&id);
    session.interaction_mut().toggle_select("switch");
    session
        .interaction_mut()
        .open_context_menu(&id, Position { x: 10.0, y: 20.0 });

    // Act: delete it.
    let deleted = session.delete_logic_device(&id).await.unwrap();

    // Assert: children move up and stale references are gone.
    assert_eq!(deleted, MutationOutcome::Applied);
    let snap = session.store().snapshot().await;
    assert!(!snap.contains(&id));
    assert_eq!(snap.node("switch").unwrap().parent_id.as_deref(), Some("gateway"));
    assert_eq!(session.interaction().selected(), ["switch".to_string()]);
    assert!(session.interaction().context_menu().is_none());
    assert_eq!(backend.calls(BackendOp::CreateLogicDevice), 1);
    assert_eq!(backend.calls(BackendOp::UpdateLogicDevice), 1);
    assert_eq!(backend.calls(BackendOp::DeleteLogicDevice), 1);
}

#[tokio::test]
async fn test_logic_device_operations_reject_physical_nodes() {
    let backend = Arc::new(InMemoryBackend::new(topology()));
    let store = loaded(Arc::clone(&backend)).await;

    let update = store
        .update_logic_device(LogicDevice {
            id: "switch".into(),
            label: "Switch".into(),
            parent_id: "gateway".into(),
            order: 0,
        })
        .await;
    let delete = store.delete_logic_device("switch").await;
    let create = store.create_logic_device("Rack", "missing").await;

    assert_eq!(update, Err(StoreError::NotALogicDevice("switch".into())));
    assert_eq!(delete, Err(StoreError::NotALogicDevice("switch".into())));
    assert!(matches!(
        create,
        Err(StoreError::InvalidReparent(ReparentError::UnknownParent(_)))
    ));
    assert_eq!(backend.mutation_calls(), 0);
}

#[tokio::test]
async fn test_refetch_removing_selected_node_clears_selection() {
    // Arrange
    let backend = Arc::new(InMemoryBackend::new(topology()));
    let mut session = TopologySession::new(loaded(Arc::clone(&backend)).await);
    session.interaction_mut().select("pc");
    session.interaction_mut().begin_drag("pc", DragMode::Reparent);

    // Act: an offline filter drops every node without that status.
    session
        .fetch(TopologyQuery::new(netviz_core::TopologyFilter::Offline))
        .await
        .unwrap();

    // Assert
    assert!(session.interaction().selected().is_empty());
    assert!(session.interaction().drag().is_none());
}
