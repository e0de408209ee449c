//! Structured event vocabulary for logging.
//!
//! Event names are used as `tracing` targets so JSONL consumers can filter
//! on a stable `event` key.

use serde::{Deserialize, Serialize};

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Where in the bridge an event was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// CLI startup and configuration.
    Init,
    /// Engine process lifecycle.
    Engine,
    /// Transcript parsing.
    Parse,
    /// RPC request handling.
    Serve,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Engine => "engine",
            Stage::Parse => "parse",
            Stage::Serve => "serve",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_ERROR: &str = "config.error";

    pub const ENGINE_SPAWNED: &str = "engine.spawned";
    pub const ENGINE_MARKER: &str = "engine.marker";
    pub const ENGINE_READY: &str = "engine.ready";
    pub const ENGINE_FAILED: &str = "engine.failed";
    pub const ENGINE_CLOSED: &str = "engine.closed";
    pub const ENGINE_DRAINED: &str = "engine.drained";

    pub const REQUEST_SENT: &str = "request.sent";
    pub const REQUEST_COMPLETE: &str = "request.complete";
    pub const REQUEST_TIMEOUT: &str = "request.timeout";
    pub const REQUEST_REWRITTEN: &str = "request.rewritten";
    pub const REQUEST_ANOMALY: &str = "request.anomaly";

    pub const RPC_RECEIVED: &str = "rpc.received";
    pub const RPC_FAILED: &str = "rpc.failed";
    pub const SERVER_LISTENING: &str = "server.listening";
    pub const SERVER_STOPPED: &str = "server.stopped";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_serialization() {
        assert_eq!(serde_json::to_string(&Stage::Engine).unwrap(), "\"engine\"");
        assert_eq!(Stage::Serve.to_string(), "serve");
    }

    #[test]
    fn test_level_from_tracing() {
        assert_eq!(Level::from(tracing::Level::INFO), Level::Info);
        assert_eq!(Level::from(tracing::Level::WARN), Level::Warn);
    }

    #[test]
    fn test_event_names_are_dotted() {
        for name in [
            event_names::ENGINE_READY,
            event_names::REQUEST_TIMEOUT,
            event_names::RPC_FAILED,
        ] {
            assert!(name.contains('.'));
        }
    }
}
