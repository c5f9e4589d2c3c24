//! Application layer of the viewer.
//!
//! Depends on `netviz_core` and on the [`snapshot_store::TopologyBackend`]
//! trait only; concrete backends live in `infrastructure`.
//!
//! # Sub-modules
//!
//! - **`snapshot_store`** – Owns the topology snapshot, runs the
//!   draft / send / refetch cycle for every mutation and tracks the
//!   synchronisation state.
//!
//! - **`interaction`** – Selection, drag, context menu and highlight state,
//!   kept apart from topology data.
//!
//! - **`session`** – Pairs a store with an interaction state and keeps the
//!   two consistent after every refetch.

pub mod interaction;
pub mod session;
pub mod snapshot_store;
