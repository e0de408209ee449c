//! Configuration snapshots for diagnostics and reproducibility.
//!
//! A snapshot records which file was loaded, its hash, and the handful of
//! values that most often explain engine behavior.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::resolve::ConfigPath;
use crate::BridgeConfig;

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the configuration.
    pub schema_version: String,

    /// Where the configuration came from.
    pub source: String,

    /// Path the configuration was loaded from.
    #[serde(default)]
    pub path: Option<String>,

    /// SHA-256 of the raw file content.
    #[serde(default)]
    pub file_hash: Option<String>,

    /// SHA-256 of the effective configuration (defaults filled in).
    pub effective_hash: String,

    /// Key configuration values for quick reference.
    pub summary: ConfigSummary,
}

/// Summary of key configuration values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub launcher: String,
    pub main_class: String,
    pub classpath_entries: usize,
    pub readiness_markers: usize,
    /// Sum of all readiness timeouts.
    pub startup_budget_secs: u64,
    pub sentinel: String,
    pub timeout_cap_secs: f64,
    pub pronouns: Vec<String>,
    pub server_addr: String,
    pub workers: usize,
}

impl ConfigSnapshot {
    /// Create a new snapshot from loaded configuration.
    pub fn new(config: &BridgeConfig, path: &ConfigPath, raw: Option<&str>) -> Self {
        let effective = toml::to_string(config).unwrap_or_default();
        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: config.schema_version.clone(),
            source: path.source.to_string(),
            path: path.path.as_ref().map(|p| p.display().to_string()),
            file_hash: raw.map(hash_content),
            effective_hash: hash_content(&effective),
            summary: ConfigSummary::from_config(config),
        }
    }

    /// Snapshot of the built-in defaults.
    pub fn defaults_only() -> Self {
        Self::new(&BridgeConfig::default(), &ConfigPath::default(), None)
    }

    /// Serialize snapshot to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check if this snapshot matches another (same effective config).
    pub fn matches(&self, other: &ConfigSnapshot) -> bool {
        self.effective_hash == other.effective_hash
    }

    /// Short identifier for this snapshot (first 12 chars of hash).
    pub fn short_id(&self) -> &str {
        &self.effective_hash[..12.min(self.effective_hash.len())]
    }
}

impl ConfigSummary {
    fn from_config(config: &BridgeConfig) -> Self {
        ConfigSummary {
            launcher: config.engine.launcher.clone(),
            main_class: config.engine.main_class.clone(),
            classpath_entries: config.engine.classpath.len(),
            readiness_markers: config.readiness.len(),
            startup_budget_secs: config.readiness.iter().map(|s| s.timeout_secs).sum(),
            sentinel: config.protocol.sentinel.clone(),
            timeout_cap_secs: config.timeouts.cap_secs,
            pronouns: config.imperative.pronouns.clone(),
            server_addr: config.server.addr(),
            workers: config.server.workers,
        }
    }
}

/// Hex-encoded SHA-256 of `content`.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
