//! TopologySession: one viewer's store plus its interaction state.
//!
//! The session forwards every operation to the [`TopologyStore`] and then
//! reconciles the [`UiInteractionState`] against the forest that resulted, so
//! selection and drag state never point at nodes a refetch removed.

use std::sync::Arc;

use netviz_core::domain::node::NodeId;
use netviz_core::protocol::{LogicDevice, TopologyQuery};
use netviz_core::TopologyView;
use tracing::debug;

use super::interaction::UiInteractionState;
use super::snapshot_store::{MutationOutcome, StoreError, TopologyStore};

pub struct TopologySession {
    store: Arc<TopologyStore>,
    interaction: UiInteractionState,
}

impl TopologySession {
    pub fn new(store: Arc<TopologyStore>) -> Self {
        Self {
            store,
            interaction: UiInteractionState::new(),
        }
    }

    pub fn store(&self) -> &Arc<TopologyStore> {
        &self.store
    }

    pub fn interaction(&self) -> &UiInteractionState {
        &self.interaction
    }

    pub fn interaction_mut(&mut self) -> &mut UiInteractionState {
        &mut self.interaction
    }

    pub async fn view(&self) -> TopologyView {
        self.store.view().await
    }

    pub async fn fetch(&mut self, query: TopologyQuery) -> Result<(), StoreError> {
        let result = self.store.fetch(query).await;
        self.reconcile().await;
        result
    }

    pub async fn toggle_collapse(&mut self, node_id: &str) -> Result<MutationOutcome, StoreError> {
        let result = self.store.toggle_collapse(node_id).await;
        self.reconcile().await;
        result
    }

    pub async fn update_label(
        &mut self,
        node_id: &str,
        label: &str,
    ) -> Result<MutationOutcome, StoreError> {
        let result = self.store.update_label(node_id, label).await;
        self.reconcile().await;
        result
    }

    pub async fn update_parent(
        &mut self,
        node_id: &str,
        new_parent_id: &str,
    ) -> Result<MutationOutcome, StoreError> {
        let result = self.store.update_parent(node_id, new_parent_id).await;
        self.reconcile().await;
        result
    }

    pub async fn create_logic_device(
        &mut self,
        label: &str,
        parent_id: &str,
    ) -> Result<(NodeId, MutationOutcome), StoreError> {
        let result = self.store.create_logic_device(label, parent_id).await;
        self.reconcile().await;
        result
    }

    pub async fn update_logic_device(
        &mut self,
        device: LogicDevice,
    ) -> Result<MutationOutcome, StoreError> {
        let result = self.store.update_logic_device(device).await;
        self.reconcile().await;
        result
    }

    pub async fn delete_logic_device(
        &mut self,
        node_id: &str,
    ) -> Result<MutationOutcome, StoreError> {
        let result = self.store.delete_logic_device(node_id).await;
        self.reconcile().await;
        result
    }

    /// Completes the active drag by dropping it on `target`.
    ///
    /// Returns `Ok(None)` when no drag is active, or when the drop would leave
    /// the source under its current parent; neither reaches the backend.  The
    /// move goes through
    /// [`TopologyStore::update_parent`], so an invalid drop is rejected by the
    /// same local checks as a direct reparent.
    ///
    /// # Errors
    ///
    /// Whatever [`TopologyStore::update_parent`] rejects, or
    /// [`StoreError::UnknownNode`] if the target has no parent to join.
    pub async fn drop_on(&mut self, target: &str) -> Result<Option<MutationOutcome>, StoreError> {
        self.interaction.hover(Some(target));
        let Some(drag) = self.interaction.end_drag() else {
            return Ok(None);
        };
        let forest = self.store.forest().await;
        let new_parent = drag
            .new_parent(&forest)
            .ok_or_else(|| StoreError::UnknownNode(target.to_string()))?;
        if drag.keeps_parent(&forest) {
            debug!(source = %drag.source, target, mode = ?drag.mode, "drop keeps the parent, ignored");
            return Ok(None);
        }
        debug!(source = %drag.source, target, mode = ?drag.mode, "drag dropped");
        self.update_parent(&drag.source, &new_parent).await.map(Some)
    }

    /// Prunes interaction state against the store's current forest.
    pub async fn reconcile(&mut self) {
        let forest = self.store.forest().await;
        self.interaction.reconcile(&forest);
    }

    /// Disposes the underlying store.  Interaction state goes with `self`.
    pub async fn dispose(self) {
        self.store.dispose().await;
    }
}
