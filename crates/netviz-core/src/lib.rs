//! # netviz-core
//!
//! Shared library for the netviz topology viewer: domain entities, the pure
//! tree / collapse / layout pipeline, and the JSON wire types spoken with the
//! topology backend.
//!
//! This crate performs no I/O and has no async runtime dependency.  The
//! client crate drives it from its snapshot store.
//!
//! # Architecture overview
//!
//! - **`domain`** – A flat list of [`Node`]s is turned into an arena
//!   [`Forest`] rooted at a single sentinel, filtered through the user's
//!   [`CollapseSet`], and laid out left-to-right by [`compute_layout`].
//!   [`project`] runs the whole chain and returns a [`TopologyView`].
//!
//! - **`protocol`** – Snapshot and mutation request types, the JSON codec,
//!   and the [`SequenceCounter`] used to stamp snapshot requests.

pub mod domain;
pub mod protocol;

pub use domain::layout::{compute_layout, Layout, LayoutParams, NodeHeights, Position};
pub use domain::node::{Edge, EdgeType, Node, NodeId, NodeType};
pub use domain::tree::{BrokenLink, Forest};
pub use domain::validation::{validate_label, validate_reparent, LabelError, ReparentError};
pub use domain::view::{project, TopologyView, ViewNode};
pub use domain::visibility::{compute_visible, CollapseSet, Visibility};
pub use protocol::codec::{decode_snapshot, encode_snapshot, ProtocolError};
pub use protocol::messages::{TopologyFilter, TopologyQuery, TopologySnapshot};
pub use protocol::sequence::SequenceCounter;
