//! Node configuration loaded from a TOML file.
//!
//! The file lives at `<config dir>/lansync/config.toml`.  A missing file
//! yields the defaults; a present but malformed file is an error, so a
//! typo never silently resets the node to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::infrastructure::network::SYNC_PORT;

const CONFIG_FILE: &str = "config.toml";

/// Errors that can occur while loading or saving the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No per-user configuration directory could be determined.
    #[error("could not determine the user configuration directory")]
    NoConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file was not valid TOML for this schema.
    #[error("malformed config at {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The configuration could not be serialized back to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NodeSection {
    /// Tracing filter directive, e.g. `info` or `lansync_node=debug`.
    pub log_level: String,
    /// Where identity and registry files live; defaults to the config
    /// directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            data_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkSection {
    /// Port the sync server listens on and discovery probes target.
    pub sync_port: u16,
    /// Per-probe budget for the subnet scan, in milliseconds.
    pub probe_timeout_ms: u64,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            sync_port: SYNC_PORT,
            probe_timeout_ms: 2_000,
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NodeConfig {
    pub node: NodeSection,
    pub network: NetworkSection,
}

impl NodeConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.network.probe_timeout_ms)
    }
}

/// The per-user configuration directory for this application.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|base| base.join("lansync"))
        .ok_or(ConfigError::NoConfigDir)
}

#[cfg(windows)]
fn platform_config_dir() -> Option<PathBuf> {
    std::env::var_os("APPDATA").map(PathBuf::from)
}

#[cfg(not(windows))]
fn platform_config_dir() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return Some(PathBuf::from(xdg));
        }
    }
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
}

/// Loads the configuration from `dir/config.toml`, falling back to the
/// defaults when the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Malformed`] when the file exists but does not
/// parse, and [`ConfigError::Io`] for other read failures.
pub fn load_config(dir: &Path) -> Result<NodeConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE);
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            let config = toml::from_str(&text).map_err(|source| ConfigError::Malformed {
                path: path.clone(),
                source,
            })?;
            debug!("loaded config from {}", path.display());
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("no config at {}, using defaults", path.display());
            Ok(NodeConfig::default())
        }
        Err(source) => Err(ConfigError::Io { path, source }),
    }
}

/// Writes the configuration to `dir/config.toml`, creating the directory
/// when needed.
pub fn save_config(dir: &Path, config: &NodeConfig) -> Result<(), ConfigError> {
    let text = toml::to_string_pretty(config)?;
    std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(CONFIG_FILE);
    std::fs::write(&path, text).map_err(|source| ConfigError::Io { path, source })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
