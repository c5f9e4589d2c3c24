//! Concrete [`TopologyBackend`](crate::application::snapshot_store::TopologyBackend)
//! implementations.
//!
//! - **`memory`** – authoritative in-process topology with call counting and
//!   failure injection.
//! - **`file`** – a JSON snapshot file served through `memory`.

pub mod file;
pub mod memory;

pub use file::FileBackend;
pub use memory::{BackendOp, InMemoryBackend};
