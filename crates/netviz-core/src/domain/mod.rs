//! Domain entities and pure algorithms for netviz.
//!
//! Nothing in here performs I/O or touches an async runtime.  Every function
//! is a deterministic function of its arguments, which is what lets the
//! viewer recompute positions from scratch on every change without the
//! picture jumping around.
//!
//! # Pipeline
//!
//! ```text
//! Vec<Node> ──► tree::Forest ──► visibility::compute_visible ──► layout::compute_layout
//!                                                               └─► view::TopologyView
//! ```

/// Node, edge and device-type definitions.
pub mod node;

/// Tree builder (flat node list → arena forest).
pub mod tree;

/// Hierarchical layout engine.
pub mod layout;

/// Collapse set and derived visibility.
pub mod visibility;

/// Visible, positioned projection handed to presentation.
pub mod view;

/// Client-side checks for labels and parent changes.
pub mod validation;
