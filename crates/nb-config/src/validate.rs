//! Configuration validation errors and semantic validation.

use std::collections::HashSet;
use thiserror::Error;

use crate::BridgeConfig;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::MissingField(_) => 64,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }

    /// True for errors about the file itself rather than its values.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            ValidationError::IoError(_) | ValidationError::ParseError(_)
        )
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Validate a bridge configuration semantically.
pub fn validate_config(config: &BridgeConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    let engine = &config.engine;
    if engine.launcher.trim().is_empty() {
        return Err(ValidationError::MissingField("engine.launcher".to_string()));
    }
    if engine.main_class.trim().is_empty() {
        return Err(ValidationError::MissingField("engine.main_class".to_string()));
    }
    if !engine.classpath.is_empty() && engine.classpath_separator.is_empty() {
        return Err(invalid(
            "engine.classpath_separator",
            "Must not be empty when a classpath is configured",
        ));
    }

    validate_readiness(config)?;

    let protocol = &config.protocol;
    if protocol.sentinel.is_empty() {
        return Err(ValidationError::MissingField("protocol.sentinel".to_string()));
    }
    if protocol.line_terminator.is_empty() {
        return Err(invalid("protocol.line_terminator", "Must not be empty"));
    }
    if protocol.read_chunk_bytes == 0 {
        return Err(invalid("protocol.read_chunk_bytes", "Must be at least 1"));
    }
    if protocol.drain_max_ms < protocol.drain_quiet_ms {
        return Err(invalid(
            "protocol.drain_max_ms",
            format!(
                "Must be >= drain_quiet_ms ({}), got {}",
                protocol.drain_quiet_ms, protocol.drain_max_ms
            ),
        ));
    }

    validate_timeouts(config)?;
    validate_pronouns(config)?;

    if config.server.workers == 0 {
        return Err(invalid("server.workers", "Must be at least 1"));
    }
    if config.server.host.trim().is_empty() {
        return Err(ValidationError::MissingField("server.host".to_string()));
    }

    Ok(())
}

fn validate_readiness(config: &BridgeConfig) -> ValidationResult<()> {
    if config.readiness.is_empty() {
        return Err(invalid("readiness", "At least one readiness marker is required"));
    }
    for (idx, step) in config.readiness.iter().enumerate() {
        if step.marker.is_empty() {
            return Err(invalid(
                &format!("readiness[{}].marker", idx),
                "Must not be empty",
            ));
        }
        if step.timeout_secs == 0 {
            return Err(invalid(
                &format!("readiness[{}].timeout_secs", idx),
                "Must be positive",
            ));
        }
    }
    Ok(())
}

fn validate_timeouts(config: &BridgeConfig) -> ValidationResult<()> {
    let t = &config.timeouts;
    if !(t.base_secs.is_finite() && t.base_secs > 0.0) {
        return Err(invalid(
            "timeouts.base_secs",
            format!("Must be positive, got {}", t.base_secs),
        ));
    }
    if !(t.chars_per_sec.is_finite() && t.chars_per_sec > 0.0) {
        return Err(invalid(
            "timeouts.chars_per_sec",
            format!("Must be positive, got {}", t.chars_per_sec),
        ));
    }
    if !t.cap_secs.is_finite() || t.cap_secs < t.base_secs {
        return Err(invalid(
            "timeouts.cap_secs",
            format!("Must be >= base_secs ({}), got {}", t.base_secs, t.cap_secs),
        ));
    }
    Ok(())
}

fn validate_pronouns(config: &BridgeConfig) -> ValidationResult<()> {
    let pronouns = &config.imperative.pronouns;
    if pronouns.is_empty() {
        return Err(invalid(
            "imperative.pronouns",
            "At least one pronoun is required",
        ));
    }
    let mut seen = HashSet::new();
    for p in pronouns {
        if p.is_empty() || p.chars().any(char::is_whitespace) {
            return Err(invalid(
                "imperative.pronouns",
                format!("{:?} must be a single non-empty word", p),
            ));
        }
        if !seen.insert(p.to_lowercase()) {
            return Err(invalid(
                "imperative.pronouns",
                format!("{:?} is listed twice", p),
            ));
        }
    }
    Ok(())
}
