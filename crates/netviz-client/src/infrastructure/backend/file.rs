//! JSON snapshot file backend.
//!
//! The file is read once on [`FileBackend::open`] into an [`InMemoryBackend`],
//! which answers every request.  With persistence enabled each accepted
//! mutation writes the full topology back to the same file.  Mutations run
//! one at a time, and a change whose write fails is rolled back so memory
//! never holds an edit the file does not.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use netviz_core::protocol::{Ack, LogicDevice, TopologyQuery, TopologySnapshot};
use netviz_core::{decode_snapshot, encode_snapshot};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::memory::InMemoryBackend;
use crate::application::snapshot_store::{BackendError, TopologyBackend};

pub struct FileBackend {
    path: PathBuf,
    persist: bool,
    memory: InMemoryBackend,
    /// Held from the in-memory change until its file write completes.
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Loads the snapshot at `path`.
    ///
    /// # Errors
    ///
    /// [`BackendError::Io`] if the file cannot be read,
    /// [`BackendError::Protocol`] if it is not a valid snapshot.
    pub async fn open(path: impl AsRef<Path>, persist: bool) -> Result<Self, BackendError> {
        let path = path.as_ref().to_path_buf();
        let bytes = tokio::fs::read(&path).await.map_err(|e| io_error(&path, &e))?;
        let snapshot = decode_snapshot(&bytes)?;
        info!(
            path = %path.display(),
            nodes = snapshot.nodes.len(),
            persist,
            "snapshot file loaded"
        );
        Ok(Self {
            path,
            persist,
            memory: InMemoryBackend::new(snapshot),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn memory(&self) -> &InMemoryBackend {
        &self.memory
    }

    /// Full topology to roll back to, taken only when writes can fail.
    async fn checkpoint(&self) -> Option<TopologySnapshot> {
        if self.persist {
            Some(self.memory.export().await)
        } else {
            None
        }
    }

    /// Writes the topology back if persistence is on and `ack` accepted a
    /// change.  On a failed write memory is restored to `before`.
    async fn commit(
        &self,
        ack: Ack,
        before: Option<TopologySnapshot>,
    ) -> Result<Ack, BackendError> {
        let Some(before) = before else {
            return Ok(ack);
        };
        if !ack.ok {
            return Ok(ack);
        }
        match self.write_file().await {
            Ok(revision) => {
                debug!(path = %self.path.display(), revision, "snapshot file written");
                Ok(ack)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "snapshot write failed, rolling back");
                self.memory.restore(before).await;
                Err(e)
            }
        }
    }

    async fn write_file(&self) -> Result<u64, BackendError> {
        let snapshot = self.memory.export().await;
        let bytes = encode_snapshot(&snapshot)?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| io_error(&self.path, &e))?;
        Ok(snapshot.metadata.revision)
    }
}

fn io_error(path: &Path, err: &std::io::Error) -> BackendError {
    BackendError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl TopologyBackend for FileBackend {
    async fn fetch_topology(
        &self,
        query: &TopologyQuery,
    ) -> Result<TopologySnapshot, BackendError> {
        self.memory.fetch_topology(query).await
    }

    async fn toggle_collapse(&self, node_id: &str, collapsed: bool) -> Result<Ack, BackendError> {
        let _guard = self.write_lock.lock().await;
        let before = self.checkpoint().await;
        let ack = self.memory.toggle_collapse(node_id, collapsed).await?;
        self.commit(ack, before).await
    }

    async fn update_parent(
        &self,
        node_id: &str,
        new_parent_id: &str,
    ) -> Result<Ack, BackendError> {
        let _guard = self.write_lock.lock().await;
        let before = self.checkpoint().await;
        let ack = self.memory.update_parent(node_id, new_parent_id).await?;
        self.commit(ack, before).await
    }

    async fn update_label(&self, node_id: &str, label: &str) -> Result<Ack, BackendError> {
        let _guard = self.write_lock.lock().await;
        let before = self.checkpoint().await;
        let ack = self.memory.update_label(node_id, label).await?;
        self.commit(ack, before).await
    }

    async fn create_logic_device(&self, device: LogicDevice) -> Result<Ack, BackendError> {
        let _guard = self.write_lock.lock().await;
        let before = self.checkpoint().await;
        let ack = self.memory.create_logic_device(device).await?;
        self.commit(ack, before).await
    }

    async fn update_logic_device(&self, device: LogicDevice) -> Result<Ack, BackendError> {
        let _guard = self.write_lock.lock().await;
        let before = self.checkpoint().await;
        let ack = self.memory.update_logic_device(device).await?;
        self.commit(ack, before).await
    }

    async fn delete_logic_device(&self, node_id: &str) -> Result<Ack, BackendError> {
        let _guard = self.write_lock.lock().await;
        let before = self.checkpoint().await;
        let ack = self.memory.delete_logic_device(node_id).await?;
        self.commit(ack, before).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::snapshot_store::{MutationOutcome, TopologyStore};
    use crate::infrastructure::backend::memory::BackendOp;
    use netviz_core::{LayoutParams, ProtocolError};
    use uuid::Uuid;

    const SNAPSHOT: &str = r#"{
        "nodes": [
            {"id": "root", "label": "Internet", "node_type": "internet", "parent_id": "root"},
            {"id": "gw", "label": "Gateway", "node_type": "gateway", "parent_id": "root"},
            {"id": "sw", "label": "Switch", "node_type": "switch", "parent_id": "gw"}
        ]
    }"#;

    fn temp_file(contents: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("netviz_test_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("topology.json");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_open_serves_file_contents() {
        // Arrange
        let (dir, path) = temp_file(SNAPSHOT);

        // Act
        let backend = FileBackend::open(&path, false).await.unwrap();
        let snap = backend.fetch_topology(&TopologyQuery::default()).await.unwrap();

        // Assert
        assert_eq!(snap.nodes.len(), 3);
        assert_eq!(snap.node("gw").unwrap().descendant_count, 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_persisted_mutation_survives_reopen() {
        // Arrange
        let (dir, path) = temp_file(SNAPSHOT);
        let backend = FileBackend::open(&path, true).await.unwrap();

        // Act
        let ack = backend.update_label("sw", "Core").await.unwrap();
        let reopened = FileBackend::open(&path, false).await.unwrap();

        // Assert
        assert!(ack.ok);
        let snap = reopened.fetch_topology(&TopologyQuery::default()).await.unwrap();
        assert_eq!(snap.node("sw").unwrap().label, "Core");
        assert_eq!(snap.metadata.revision, 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back_the_change() {
        // Arrange
        let (dir, path) = temp_file(SNAPSHOT);
        let backend = FileBackend::open(&path, true).await.unwrap();
        assert_eq!(backend.path(), path.as_path());
        std::fs::remove_dir_all(&dir).unwrap();

        // Act
        let result = backend.update_label("sw", "Core").await;

        // Assert
        assert!(matches!(result, Err(BackendError::Io { .. })));
        let snap = backend.fetch_topology(&TopologyQuery::default()).await.unwrap();
        assert_eq!(snap.node("sw").unwrap().label, "Switch");
        assert_eq!(backend.memory().revision().await, 0);
    }

    #[tokio::test]
    async fn test_store_reverts_when_the_write_fails() {
        // Arrange
        let (dir, path) = temp_file(SNAPSHOT);
        let backend = Arc::new(FileBackend::open(&path, true).await.unwrap());
        let store = TopologyStore::new(backend.clone(), LayoutParams::default());
        store.fetch(TopologyQuery::default()).await.unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        // Act
        let outcome = store.update_label("sw", "Core").await.unwrap();

        // Assert
        assert!(matches!(outcome, MutationOutcome::Reverted(_)));
        assert_eq!(store.snapshot().await.node("sw").unwrap().label, "Switch");
        assert_eq!(backend.memory().calls(BackendOp::UpdateLabel), 1);
    }

    #[tokio::test]
    async fn test_concurrent_mutations_all_reach_the_file() {
        // Arrange
        let (dir, path) = temp_file(SNAPSHOT);
        let backend = FileBackend::open(&path, true).await.unwrap();

        // Act
        let (first, second) = tokio::join!(
            backend.update_label("sw", "Core"),
            backend.update_label("gw", "Edge"),
        );
        let reopened = FileBackend::open(backend.path(), false).await.unwrap();

        // Assert
        assert!(first.unwrap().ok);
        assert!(second.unwrap().ok);
        let snap = reopened.fetch_topology(&TopologyQuery::default()).await.unwrap();
        assert_eq!(snap.node("sw").unwrap().label, "Core");
        assert_eq!(snap.node("gw").unwrap().label, "Edge");
        assert_eq!(snap.metadata.revision, 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_read_only_backend_leaves_file_untouched() {
        let (dir, path) = temp_file(SNAPSHOT);
        let backend = FileBackend::open(&path, false).await.unwrap();

        backend.toggle_collapse("gw", true).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), SNAPSHOT);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_open_missing_file_is_io_error() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/topology.json");
        let result = FileBackend::open(&path, false).await;
        assert!(matches!(result, Err(BackendError::Io { .. })));
    }

    #[tokio::test]
    async fn test_open_malformed_file_is_protocol_error() {
        let (dir, path) = temp_file("{ not json");
        let result = FileBackend::open(&path, false).await;
        assert!(matches!(
            result,
            Err(BackendError::Protocol(ProtocolError::MalformedPayload(_)))
        ));
        std::fs::remove_dir_all(&dir).ok();
    }
}
