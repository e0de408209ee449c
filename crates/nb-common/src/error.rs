//! Error types for nlp-bridge.
//!
//! Every failure the bridge can surface carries:
//! - a stable numeric code and string code for machine parsing
//! - a category for grouping
//! - a recoverability hint (fatal errors require a fresh engine start)
//! - a suggested action and a human remediation line
//!
//! Errors serialize to an [`ErrorReport`] for remote callers:
//! ```json
//! {
//!   "code": 25,
//!   "code_name": "ERR_CHANNEL_TIMEOUT",
//!   "category": "engine",
//!   "message": "engine did not answer within 4.00s (37 bytes captured)",
//!   "recoverable": true,
//!   "suggested_action": "retry"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for nlp-bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file and resource layout errors.
    Config,
    /// External engine process and channel errors.
    Engine,
    /// Transcript grammar errors.
    Transcript,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Engine => write!(f, "engine"),
            ErrorCategory::Transcript => write!(f, "transcript"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Suggested actions for callers to take in response to errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry the same request.
    Retry,
    /// Tear down and start the engine again.
    Restart,
    /// Fix the configuration file.
    FixConfig,
    /// Install or point at the missing resource.
    InstallResource,
    /// Report the offending input; retrying will not help.
    Report,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::Restart => write!(f, "restart"),
            SuggestedAction::FixConfig => write!(f, "fix_config"),
            SuggestedAction::InstallResource => write!(f, "install_resource"),
            SuggestedAction::Report => write!(f, "report"),
        }
    }
}

/// Unified error type for nlp-bridge.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Engine / channel errors (20-29)
    #[error("required resource not found: {}", path.display())]
    MissingResource { path: PathBuf },

    #[error("failed to spawn engine: {0}")]
    SpawnFailed(String),

    #[error("engine never printed {marker:?} (waited {elapsed:.2?})")]
    InitializationTimeout { marker: String, elapsed: Duration },

    #[error("engine process exited unexpectedly (status {})", status.map_or_else(|| "unknown".to_string(), |s| s.to_string()))]
    ProcessCrashed { status: Option<i32> },

    #[error("channel is not ready (state: {state})")]
    NotReady { state: String },

    #[error("engine did not answer within {:.2}s ({partial_bytes} bytes captured)", elapsed.as_secs_f64())]
    ChannelTimeout {
        elapsed: Duration,
        partial_bytes: usize,
    },

    // Transcript errors (30-39)
    #[error("malformed transcript at line {line_no} while reading {state}: {line:?}")]
    Format {
        line_no: usize,
        line: String,
        state: String,
    },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Engine and channel errors
    /// - 30-39: Transcript errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig(_) => 11,
            Error::MissingResource { .. } => 20,
            Error::SpawnFailed(_) => 21,
            Error::InitializationTimeout { .. } => 22,
            Error::ProcessCrashed { .. } => 23,
            Error::NotReady { .. } => 24,
            Error::ChannelTimeout { .. } => 25,
            Error::Format { .. } => 30,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Stable string form of [`Error::code`].
    pub fn code_name(&self) -> &'static str {
        match self {
            Error::Config(_) => "ERR_CONFIG",
            Error::InvalidConfig(_) => "ERR_INVALID_CONFIG",
            Error::MissingResource { .. } => "ERR_MISSING_RESOURCE",
            Error::SpawnFailed(_) => "ERR_SPAWN",
            Error::InitializationTimeout { .. } => "ERR_INIT_TIMEOUT",
            Error::ProcessCrashed { .. } => "ERR_PROCESS_CRASHED",
            Error::NotReady { .. } => "ERR_NOT_READY",
            Error::ChannelTimeout { .. } => "ERR_CHANNEL_TIMEOUT",
            Error::Format { .. } => "ERR_FORMAT",
            Error::Io(_) => "ERR_IO",
            Error::Json(_) => "ERR_JSON",
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) => ErrorCategory::Config,

            Error::MissingResource { .. }
            | Error::SpawnFailed(_)
            | Error::InitializationTimeout { .. }
            | Error::ProcessCrashed { .. }
            | Error::NotReady { .. }
            | Error::ChannelTimeout { .. } => ErrorCategory::Engine,

            Error::Format { .. } => ErrorCategory::Transcript,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether the engine channel stays usable after this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) => false,
            Error::InvalidConfig(_) => false,

            // Startup faults leave no usable process behind
            Error::MissingResource { .. } => false,
            Error::SpawnFailed(_) => false,
            Error::InitializationTimeout { .. } => false,
            Error::ProcessCrashed { .. } => false,
            Error::NotReady { .. } => false,

            // Per-request faults: the channel is still ready
            Error::ChannelTimeout { .. } => true,
            Error::Format { .. } => true,

            Error::Io(_) => true,
            Error::Json(_) => true,
        }
    }

    /// Fatal errors leave the channel unusable until it is started again.
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Engine && !self.is_recoverable()
    }

    /// Returns the suggested action for callers.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) => SuggestedAction::FixConfig,
            Error::MissingResource { .. } => SuggestedAction::InstallResource,
            Error::SpawnFailed(_) => SuggestedAction::FixConfig,
            Error::InitializationTimeout { .. } => SuggestedAction::Restart,
            Error::ProcessCrashed { .. } => SuggestedAction::Restart,
            Error::NotReady { .. } => SuggestedAction::Restart,
            Error::ChannelTimeout { .. } => SuggestedAction::Retry,
            Error::Format { .. } => SuggestedAction::Report,
            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::Report,
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidConfig(_) => "Invalid Configuration",
            Error::MissingResource { .. } => "Missing Resource",
            Error::SpawnFailed(_) => "Engine Spawn Failed",
            Error::InitializationTimeout { .. } => "Engine Startup Timed Out",
            Error::ProcessCrashed { .. } => "Engine Crashed",
            Error::NotReady { .. } => "Engine Not Ready",
            Error::ChannelTimeout { .. } => "Engine Response Timed Out",
            Error::Format { .. } => "Malformed Transcript",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) => {
                "Run 'nlp-bridge check' to validate the configuration file."
            }
            Error::MissingResource { .. } => {
                "Download the engine jars and properties file, or set engine.engine_dir to their location."
            }
            Error::SpawnFailed(_) => {
                "Check that engine.launcher is installed and on PATH."
            }
            Error::InitializationTimeout { .. } => {
                "Model loading is slow on cold caches. Raise the readiness timeouts or give the JVM more memory."
            }
            Error::ProcessCrashed { .. } => {
                "The engine exited. Restart the bridge; check engine stderr for OutOfMemoryError."
            }
            Error::NotReady { .. } => "Start the engine before sending requests.",
            Error::ChannelTimeout { .. } => {
                "Retry the request. Long inputs need a larger timeouts.cap_secs."
            }
            Error::Format { .. } => {
                "The engine output did not match the expected layout. Check the properties file annotators."
            }
            Error::Io(_) => "Check file permissions and retry.",
            Error::Json(_) => "Check the request body is valid JSON.",
        }
    }

    /// Structured form for remote callers.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            code_name: self.code_name().to_string(),
            category: self.category(),
            message: self.to_string(),
            recoverable: self.is_recoverable(),
            suggested_action: self.suggested_action(),
        }
    }
}

/// Serializable error summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: u32,
    pub code_name: String,
    pub category: ErrorCategory,
    pub message: String,
    pub recoverable: bool,
    pub suggested_action: SuggestedAction,
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code_name, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<Error> {
        vec![
            Error::Config("x".into()),
            Error::InvalidConfig("x".into()),
            Error::MissingResource {
                path: PathBuf::from("xom.jar"),
            },
            Error::SpawnFailed("x".into()),
            Error::InitializationTimeout {
                marker: "done.".into(),
                elapsed: Duration::from_secs(20),
            },
            Error::ProcessCrashed { status: Some(1) },
            Error::NotReady {
                state: "closed".into(),
            },
            Error::ChannelTimeout {
                elapsed: Duration::from_secs(5),
                partial_bytes: 10,
            },
            Error::Format {
                line_no: 3,
                line: "oops".into(),
                state: "words".into(),
            },
            Error::Io(std::io::Error::other("disk")),
            Error::Json(serde_json::from_str::<serde_json::Value>("{").unwrap_err()),
        ]
    }

    #[test]
    fn codes_are_unique() {
        let mut codes: Vec<u32> = all_variants().iter().map(Error::code).collect();
        let n = codes.len();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), n);
    }

    #[test]
    fn codes_match_categories() {
        for err in all_variants() {
            let range = match err.category() {
                ErrorCategory::Config => 10..20,
                ErrorCategory::Engine => 20..30,
                ErrorCategory::Transcript => 30..40,
                ErrorCategory::Io => 60..70,
            };
            assert!(range.contains(&err.code()), "{:?}", err);
        }
    }

    #[test]
    fn startup_faults_are_fatal() {
        assert!(Error::InitializationTimeout {
            marker: "done.".into(),
            elapsed: Duration::from_secs(1)
        }
        .is_fatal());
        assert!(Error::ProcessCrashed { status: None }.is_fatal());
        assert!(Error::MissingResource {
            path: PathBuf::from("a.jar")
        }
        .is_fatal());
    }

    #[test]
    fn request_faults_are_recoverable() {
        let timeout = Error::ChannelTimeout {
            elapsed: Duration::from_secs(5),
            partial_bytes: 0,
        };
        assert!(timeout.is_recoverable());
        assert!(!timeout.is_fatal());
        assert_eq!(timeout.suggested_action(), SuggestedAction::Retry);

        let format = Error::Format {
            line_no: 1,
            line: "x".into(),
            state: "words".into(),
        };
        assert!(format.is_recoverable());
        assert_eq!(format.category(), ErrorCategory::Transcript);
    }

    #[test]
    fn report_serializes_snake_case() {
        let report = Error::ProcessCrashed { status: Some(137) }.report();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["code"], 23);
        assert_eq!(json["code_name"], "ERR_PROCESS_CRASHED");
        assert_eq!(json["category"], "engine");
        assert_eq!(json["suggested_action"], "restart");
        assert_eq!(json["recoverable"], false);
        assert!(json["message"].as_str().unwrap().contains("137"));
    }

    #[test]
    fn channel_timeout_message_has_no_transcript() {
        let err = Error::ChannelTimeout {
            elapsed: Duration::from_millis(4000),
            partial_bytes: 37,
        };
        assert_eq!(
            err.to_string(),
            "engine did not answer within 4.00s (37 bytes captured)"
        );
    }

    #[test]
    fn every_variant_has_text() {
        for err in all_variants() {
            assert!(!err.headline().is_empty());
            assert!(!err.remediation().is_empty());
            assert!(!err.to_string().is_empty());
        }
    }
}
