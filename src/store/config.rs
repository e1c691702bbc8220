//! Store configuration file support.
//!
//! Reads the tiered-store settings from a TOML file: which primary backend
//! to use, the REST mirror endpoint and credentials, the local key-value
//! file, and HTTP client timeouts.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::net::HttpConfig;

use super::error::StoreError;

/// Built-in primary tier backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryKind {
    /// In-memory document store (local development and tests). Custom
    /// backends are injected through the builder instead.
    Memory,
}

impl FromStr for PrimaryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            _ => Err(format!("Unknown primary store type: {}", s)),
        }
    }
}

/// Store configuration from file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub store: StoreSettings,
    #[serde(default)]
    pub mirror: MirrorSettings,
    #[serde(default)]
    pub local: LocalSettings,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Primary tier selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(rename = "type")]
    pub primary_type: String,
}

/// REST mirror endpoint settings. The mirror tier is enabled only when a
/// base URL and project id are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorSettings {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub api_key: String,
}

impl MirrorSettings {
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.project_id.is_empty()
    }
}

/// Local persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalSettings {
    #[serde(default = "default_kv_path")]
    pub kv_path: String,
}

fn default_kv_path() -> String {
    "skyscout_kv.json".to_string()
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            kv_path: default_kv_path(),
        }
    }
}

impl StoreConfig {
    /// Load store configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            StoreError::configuration(format!("Failed to read config file: {}", e))
        })?;
        let config: StoreConfig = toml::from_str(&content).map_err(|e| {
            StoreError::configuration(format!("Failed to parse config file: {}", e))
        })?;
        Ok(config)
    }

    /// Load store configuration from the default locations.
    ///
    /// Searches for `skyscout.toml` in the current directory, `config/`,
    /// and the parent directory.
    pub fn from_default_location() -> Result<Self, StoreError> {
        let search_paths = [
            PathBuf::from("skyscout.toml"),
            PathBuf::from("config/skyscout.toml"),
            PathBuf::from("../skyscout.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(StoreError::configuration(
            "No skyscout.toml found in standard locations",
        ))
    }

    pub fn primary_kind(&self) -> Result<PrimaryKind, StoreError> {
        self.store
            .primary_type
            .parse()
            .map_err(|e: String| StoreError::configuration(e))
    }
}
