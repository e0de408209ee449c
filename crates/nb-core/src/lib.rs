//! nlp-bridge Core Library
//!
//! This library drives a long-running interactive CoreNLP shell and turns
//! its console output into structured parse records:
//! - Engine channel (spawn, readiness, request/response framing, shutdown)
//! - Transcript parsing
//! - Imperative sentence rewriting
//! - JSON-RPC service over HTTP and stdio
//! - Exit codes, logging and progress events for the CLI
//!
//! The binary entry point is in `main.rs`.

pub mod bridge;
pub mod channel;
pub mod events;
pub mod exit_codes;
pub mod imperative;
pub mod logging;
pub mod output;
pub mod relations;
pub mod service;
pub mod shutdown;
pub mod transcript;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use bridge::{BridgeStatus, EngineLaunch, NlpBridge};
pub use channel::{Channel, ChannelState, Exchange, ProcessCommand, TimeoutPolicy, Transcript};
pub use imperative::{ImperativeRewriter, SentenceParser};
pub use relations::DependencyHierarchy;
pub use transcript::parse_transcript;
