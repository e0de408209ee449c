//! nlp-bridge configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for bridge.toml
//! - Config resolution (CLI → env → XDG → /etc → defaults)
//! - Semantic validation
//! - Config snapshots for `check` and startup logs

pub mod engine;
pub mod protocol;
pub mod resolve;
pub mod snapshot;
pub mod validate;

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use engine::{default_readiness, EngineConfig, ReadinessStep};
pub use protocol::{ImperativeConfig, ProtocolConfig, ResponseTimeouts, ServerConfig};
pub use resolve::{resolve_config, ConfigPath, ConfigSource};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_config, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Root of bridge.toml. Every section may be omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub schema_version: String,
    pub engine: EngineConfig,
    pub readiness: Vec<ReadinessStep>,
    pub protocol: ProtocolConfig,
    pub timeouts: ResponseTimeouts,
    pub imperative: ImperativeConfig,
    pub server: ServerConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION.to_string(),
            engine: EngineConfig::default(),
            readiness: default_readiness(),
            protocol: ProtocolConfig::default(),
            timeouts: ResponseTimeouts::default(),
            imperative: ImperativeConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Load from a TOML file (not validated).
    pub fn from_file(path: &Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse from a TOML string (not validated).
    pub fn from_toml_str(content: &str) -> ValidationResult<Self> {
        toml::from_str(content)
            .map_err(|e| ValidationError::ParseError(format!("Invalid TOML: {}", e)))
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> ValidationResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ValidationError::ParseError(format!("Cannot render TOML: {}", e)))
    }
}

/// A resolved, validated configuration plus its snapshot.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: BridgeConfig,
    pub location: ConfigPath,
    pub snapshot: ConfigSnapshot,
}

/// Resolve, read and validate the configuration.
pub fn load_config(cli_path: Option<&Path>) -> ValidationResult<LoadedConfig> {
    let location = resolve_config(cli_path);
    let (config, raw) = match &location.path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
            })?;
            (BridgeConfig::from_toml_str(&raw)?, Some(raw))
        }
        None => (BridgeConfig::default(), None),
    };
    validate_config(&config)?;
    let snapshot = ConfigSnapshot::new(&config, &location, raw.as_deref());
    Ok(LoadedConfig {
        config,
        location,
        snapshot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, BridgeConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = BridgeConfig::from_toml_str(
            r#"
            [engine]
            engine_dir = "/opt/corenlp"

            [timeouts]
            cap_secs = 8
            "#,
        )
        .unwrap();
        assert_eq!(cfg.engine.launcher, "java");
        assert_eq!(
            cfg.engine.engine_dir.as_deref(),
            Some(Path::new("/opt/corenlp"))
        );
        assert_eq!(cfg.timeouts.cap_secs, 8.0);
        assert_eq!(cfg.timeouts.base_secs, 3.0);
        assert_eq!(cfg.readiness.len(), 6);
    }

    #[test]
    fn readiness_table_replaces_default_sequence() {
        let cfg = BridgeConfig::from_toml_str(
            r#"
            [[readiness]]
            marker = "ready"
            timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.readiness, vec![ReadinessStep::new("ready", 5)]);
    }

    #[test]
    fn toml_round_trip_preserves_defaults() {
        let cfg = BridgeConfig::default();
        let text = cfg.to_toml_string().unwrap();
        assert_eq!(BridgeConfig::from_toml_str(&text).unwrap(), cfg);
    }

    #[test]
    fn parse_error_is_reported() {
        let err = BridgeConfig::from_toml_str("[engine\n").unwrap_err();
        assert!(matches!(err, ValidationError::ParseError(_)));
    }

    #[test]
    fn missing_cli_file_is_io_error() {
        let err = load_config(Some(Path::new("/nonexistent/bridge.toml"))).unwrap_err();
        assert!(matches!(err, ValidationError::IoError(_)));
    }
}
