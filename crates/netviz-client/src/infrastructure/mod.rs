//! Infrastructure layer of the viewer.
//!
//! Contains the concrete topology backends and configuration storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `netviz_core`, but MUST NOT be imported by the `application` layer.

pub mod backend;
pub mod storage;
