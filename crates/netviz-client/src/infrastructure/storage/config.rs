//! TOML-based configuration for the viewer.
//!
//! Reads and writes [`ViewerConfig`] from an explicit path or the
//! platform-appropriate config file:
//! - Windows:  `%APPDATA%\netviz\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/netviz/config.toml` (or `~/.config/netviz/…`)
//! - macOS:    `~/Library/Application Support/netviz/config.toml`
//!
//! ```toml
//! [viewer]
//! log_level = "info"
//! default_filter = "all"
//!
//! [layout]
//! depth_spacing = 220.0
//! sibling_gap = 16.0
//! default_height = 36.0
//!
//! [layout.heights]
//! switch = 40.0
//!
//! [backend]
//! snapshot_path = "topology.json"
//! ```
//!
//! Every field has a serde default, so a missing file, a missing section and
//! a missing key all fall back to the same values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use netviz_core::protocol::TopologyFilter;
use netviz_core::{LayoutParams, NodeHeights, NodeType};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level viewer configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ViewerConfig {
    #[serde(default)]
    pub viewer: ViewerSection,
    #[serde(default)]
    pub layout: LayoutSection,
    #[serde(default)]
    pub backend: BackendSection,
}

/// General viewer behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewerSection {
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Filter used for the first fetch.
    #[serde(default)]
    pub default_filter: TopologyFilter,
    /// Site requested from the backend, if it serves several.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
}

/// Layout engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutSection {
    #[serde(default = "default_depth_spacing")]
    pub depth_spacing: f64,
    #[serde(default = "default_sibling_gap")]
    pub sibling_gap: f64,
    /// Height of node types without an entry in `heights`.
    #[serde(default = "default_height")]
    pub default_height: f64,
    /// Per-type overrides on top of the built-in height table, keyed by
    /// wire type name (`switch`, `access_point`, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub heights: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BackendSection {
    /// Snapshot file used when `--snapshot` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_depth_spacing() -> f64 {
    220.0
}
fn default_sibling_gap() -> f64 {
    16.0
}
fn default_height() -> f64 {
    36.0
}

impl Default for ViewerSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            default_filter: TopologyFilter::All,
            site: None,
        }
    }
}

impl Default for LayoutSection {
    fn default() -> Self {
        Self {
            depth_spacing: default_depth_spacing(),
            sibling_gap: default_sibling_gap(),
            default_height: default_height(),
            heights: BTreeMap::new(),
        }
    }
}

impl LayoutSection {
    /// Layout parameters: the built-in height table with this section's
    /// overrides applied.  Unknown type names are skipped with a warning.
    pub fn to_params(&self) -> LayoutParams {
        let mut heights = NodeHeights::default();
        heights.default_height = self.default_height;
        for (name, &height) in &self.heights {
            match NodeType::ALL.iter().find(|ty| ty.as_str() == name.as_str()) {
                Some(&ty) => {
                    heights.overrides.insert(ty, height);
                }
                None => warn!(node_type = %name, "ignoring height for unknown node type"),
            }
        }
        LayoutParams {
            depth_spacing: self.depth_spacing,
            sibling_gap: self.sibling_gap,
            heights,
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config from the platform config file.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<ViewerConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads the config at `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<ViewerConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: ViewerConfig = toml::from_str(&content)?;
            debug!(path = %path.display(), "config loaded");
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(ViewerConfig::default())
        }
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &ViewerConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config directory including the `netviz` component.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("netviz"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("netviz"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("netviz")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
