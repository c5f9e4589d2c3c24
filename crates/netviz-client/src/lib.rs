//! # netviz-client
//!
//! Client side of the netviz topology viewer: the snapshot store that keeps a
//! local copy of the backend topology in sync, the transient interaction
//! state, and the backends and configuration used by the `netviz` binary.
//!
//! Integration tests in `tests/` and `main.rs` share this module tree.

pub mod application;
pub mod infrastructure;

pub use application::interaction::{DragMode, UiInteractionState};
pub use application::session::TopologySession;
pub use application::snapshot_store::{
    BackendError, MutationOutcome, StoreError, SyncState, TopologyBackend, TopologyStore,
};
pub use infrastructure::backend::{BackendOp, FileBackend, InMemoryBackend};
