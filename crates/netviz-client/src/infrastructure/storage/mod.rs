//! Storage infrastructure: viewer configuration persistence.
//!
//! The `config` sub-module reads the TOML configuration from an explicit
//! path or the platform config directory, falls back to defaults when the
//! file does not exist, and can write a configuration back to disk.

pub mod config;
