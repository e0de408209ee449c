//! Interactive protocol, response timeout, imperative and server settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request/response framing of the interactive shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Literal prompt that ends every response.
    pub sentinel: String,

    /// Appended to every request line.
    pub line_terminator: String,

    /// Stale output drain stops after this much silence.
    pub drain_quiet_ms: u64,

    /// Upper bound on a single stale output drain.
    pub drain_max_ms: u64,

    /// Treat stderr output as part of the transcript stream.
    pub merge_stderr: bool,

    /// Size of each blocking read on the engine's output pipes.
    pub read_chunk_bytes: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            sentinel: "\nNLP>".to_string(),
            line_terminator: "\n".to_string(),
            drain_quiet_ms: 300,
            drain_max_ms: 2000,
            merge_stderr: true,
            read_chunk_bytes: 4096,
        }
    }
}

impl ProtocolConfig {
    pub fn drain_quiet(&self) -> Duration {
        Duration::from_millis(self.drain_quiet_ms)
    }

    pub fn drain_max(&self) -> Duration {
        Duration::from_millis(self.drain_max_ms)
    }
}

/// Length-scaled response budget: `min(cap, base + len / rate)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseTimeouts {
    pub base_secs: f64,
    pub chars_per_sec: f64,
    pub cap_secs: f64,
}

impl Default for ResponseTimeouts {
    fn default() -> Self {
        Self {
            base_secs: 3.0,
            chars_per_sec: 20.0,
            cap_secs: 5.0,
        }
    }
}

impl ResponseTimeouts {
    /// Budget for a request of `len` characters.
    pub fn budget_for(&self, len: usize) -> Duration {
        let secs = (self.base_secs + len as f64 / self.chars_per_sec).min(self.cap_secs);
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Synthetic subject candidates for imperative input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImperativeConfig {
    pub pronouns: Vec<String>,
}

impl Default for ImperativeConfig {
    fn default() -> Self {
        Self {
            pronouns: ["you", "he", "she", "i"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// JSON-RPC listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: 4,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
