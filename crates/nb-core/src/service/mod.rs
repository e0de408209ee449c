//! Remote-callable front of the bridge.
//!
//! Envelopes arrive over HTTP ([`http`]) or stdin ([`stdio`]); both hand the
//! raw text to [`Service::handle`], which dispatches through a
//! [`MethodRegistry`] of statically typed handlers.

pub mod dispatch;
pub mod http;
pub mod protocol;
pub mod stdio;

pub use dispatch::{DispatchError, MethodInfo, MethodRegistry, RegistrationError};
pub use protocol::{RpcError, RpcRequest, RpcResponse};

use crate::bridge::{BridgeStatus, NlpBridge};
use crate::relations::DependencyHierarchy;
use nb_common::{ParseResult, Result};
use serde::de::IgnoredAny;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// What the service needs from a parser engine.
pub trait Backend: Send + Sync {
    fn parse(&self, text: &str) -> Result<ParseResult>;
    fn parse_imperative(&self, text: &str) -> Result<ParseResult>;
    fn status(&self) -> BridgeStatus;
}

impl Backend for NlpBridge {
    fn parse(&self, text: &str) -> Result<ParseResult> {
        NlpBridge::parse(self, text)
    }

    fn parse_imperative(&self, text: &str) -> Result<ParseResult> {
        NlpBridge::parse_imperative(self, text)
    }

    fn status(&self) -> BridgeStatus {
        NlpBridge::status(self)
    }
}

/// Handler context.
pub struct ServiceState {
    pub backend: Arc<dyn Backend>,
    pub methods: Vec<MethodInfo>,
    pub started: Instant,
}

/// `ping` reply.
#[derive(Debug, Clone, Serialize)]
pub struct PingReply {
    pub pong: bool,
    pub version: &'static str,
    pub uptime_ms: u64,
    pub engine: BridgeStatus,
}

/// Registry plus context, shared by every transport worker.
pub struct Service {
    registry: MethodRegistry<ServiceState>,
    state: ServiceState,
}

impl Service {
    pub fn new(backend: Arc<dyn Backend>) -> std::result::Result<Self, RegistrationError> {
        let registry = default_registry()?;
        let state = ServiceState {
            backend,
            methods: registry.methods(),
            started: Instant::now(),
        };
        Ok(Self { registry, state })
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.state.backend
    }

    pub fn methods(&self) -> &[MethodInfo] {
        &self.state.methods
    }

    /// Handle one raw envelope.
    pub fn handle(&self, raw: &str) -> RpcResponse {
        self.registry.dispatch(&self.state, raw)
    }

    /// Handle one raw envelope and serialize the reply.
    pub fn handle_json(&self, raw: &str) -> String {
        self.handle(raw).to_json()
    }

    pub fn ping(&self) -> PingReply {
        ping(&self.state)
    }
}

fn ping(state: &ServiceState) -> PingReply {
    PingReply {
        pong: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime_ms: state.started.elapsed().as_millis() as u64,
        engine: state.backend.status(),
    }
}

/// The methods every bridge service exposes.
pub fn default_registry() -> std::result::Result<MethodRegistry<ServiceState>, RegistrationError> {
    let mut reg = MethodRegistry::new();
    reg.register(
        "parse",
        "Parse text and return sentences, dependencies and coreference chains",
        &["text"],
        |s: &ServiceState, (text,): (String,)| s.backend.parse(&text),
    )?;
    reg.register(
        "parse_imperative",
        "Parse a verb-initial sentence with a synthetic subject removed from the result",
        &["text"],
        |s: &ServiceState, (text,): (String,)| s.backend.parse_imperative(&text),
    )?;
    reg.register(
        "relation_isa",
        "Whether a dependency relation is a kind of another",
        &["relation", "ancestor"],
        |_: &ServiceState, (relation, ancestor): (String, String)| {
            Ok(DependencyHierarchy::standard().isa(&relation, &ancestor))
        },
    )?;
    reg.register(
        "ping",
        "Liveness and engine status",
        &[],
        |s: &ServiceState, _: IgnoredAny| Ok(ping(s)),
    )?;
    reg.register(
        "list_methods",
        "Registered methods and their parameters",
        &[],
        |s: &ServiceState, _: IgnoredAny| Ok(s.methods.clone()),
    )?;
    Ok(reg)
}
