//! Shared, thread-safe front of one engine.
//!
//! [`NlpBridge`] holds the channel behind a mutex so concurrent RPC workers
//! take turns: a request owns the engine from the moment its line is written
//! until its transcript (or timeout) comes back. Transcript parsing happens
//! after the lock is released.

use crate::channel::{Channel, ChannelState, ProcessCommand, TimeoutPolicy, Transcript};
use crate::events::{self, Phase, ProgressEmitter, ProgressEvent};
use crate::imperative::{ImperativeRewriter, SentenceParser};
use crate::logging::{event_names, redact_for_log};
use crate::transcript::parse_transcript;
use nb_common::{ParseResult, Result};
use nb_config::{BridgeConfig, ProtocolConfig, ReadinessStep};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};
use tracing::{debug, info, instrument};

/// Longest request text echoed into logs.
const LOG_TEXT_LIMIT: usize = 120;

/// Everything needed to (re)start the engine.
#[derive(Debug, Clone)]
pub struct EngineLaunch {
    pub command: ProcessCommand,
    pub resources: Vec<PathBuf>,
    pub readiness: Vec<ReadinessStep>,
}

impl EngineLaunch {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            command: ProcessCommand::from_engine(&config.engine),
            resources: config.engine.required_resources(),
            readiness: config.readiness.clone(),
        }
    }
}

/// Snapshot of bridge health for `ping` and `/health`.
///
/// `busy` means a request (or startup) held the engine when the snapshot
/// was taken; `state` and `pid` are then as of the last time it was free.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeStatus {
    pub state: ChannelState,
    pub pid: Option<u32>,
    pub busy: bool,
    pub requests: u64,
    pub timeouts: u64,
}

/// Channel state and pid, readable without the channel lock.
#[derive(Debug)]
struct Published {
    state: AtomicU8,
    /// 0 when no engine is running.
    pid: AtomicU32,
}

impl Published {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(state_code(ChannelState::Unstarted)),
            pid: AtomicU32::new(0),
        }
    }

    fn set_state(&self, state: ChannelState) {
        self.state.store(state_code(state), Ordering::Release);
    }

    fn record(&self, channel: &Channel) {
        self.set_state(channel.state());
        self.pid.store(channel.pid().unwrap_or(0), Ordering::Release);
    }

    fn state(&self) -> ChannelState {
        match self.state.load(Ordering::Acquire) {
            0 => ChannelState::Unstarted,
            1 => ChannelState::Starting,
            2 => ChannelState::Ready,
            3 => ChannelState::Closed,
            _ => ChannelState::Failed,
        }
    }

    fn pid(&self) -> Option<u32> {
        match self.pid.load(Ordering::Acquire) {
            0 => None,
            pid => Some(pid),
        }
    }
}

fn state_code(state: ChannelState) -> u8 {
    match state {
        ChannelState::Unstarted => 0,
        ChannelState::Starting => 1,
        ChannelState::Ready => 2,
        ChannelState::Closed => 3,
        ChannelState::Failed => 4,
    }
}

/// One engine shared by every caller.
pub struct NlpBridge {
    channel: Mutex<Channel>,
    published: Published,
    launch: EngineLaunch,
    timeouts: Box<dyn TimeoutPolicy>,
    pronouns: Vec<String>,
    requests: AtomicU64,
    timed_out: AtomicU64,
}

impl NlpBridge {
    /// Bridge for the configured engine. Call [`NlpBridge::start`] before
    /// sending requests.
    pub fn new(config: &BridgeConfig) -> Self {
        Self::with_launch(
            EngineLaunch::from_config(config),
            config.protocol.clone(),
            config.timeouts,
            config.imperative.pronouns.clone(),
        )
    }

    pub fn with_launch(
        launch: EngineLaunch,
        protocol: ProtocolConfig,
        timeouts: impl TimeoutPolicy + 'static,
        pronouns: Vec<String>,
    ) -> Self {
        Self {
            channel: Mutex::new(Channel::new(protocol)),
            published: Published::new(),
            launch,
            timeouts: Box::new(timeouts),
            pronouns,
            requests: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Channel> {
        self.channel.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start (or restart) the engine, reporting each readiness marker.
    pub fn start(&self, emitter: &dyn ProgressEmitter) -> Result<()> {
        let mut channel = self.lock();
        self.published.set_state(ChannelState::Starting);
        let outcome = channel.start(
            &self.launch.command,
            &self.launch.resources,
            &self.launch.readiness,
            emitter,
        );
        self.published.record(&channel);
        outcome
    }

    pub fn state(&self) -> ChannelState {
        self.status().state
    }

    /// Health snapshot. Never waits for a request in flight.
    pub fn status(&self) -> BridgeStatus {
        let (state, pid, busy) = match self.channel.try_lock() {
            Ok(channel) => {
                self.published.record(&channel);
                (channel.state(), channel.pid(), false)
            }
            Err(TryLockError::Poisoned(e)) => {
                let channel = e.into_inner();
                self.published.record(&channel);
                (channel.state(), channel.pid(), false)
            }
            Err(TryLockError::WouldBlock) => (self.published.state(), self.published.pid(), true),
        };
        BridgeStatus {
            state,
            pid,
            busy,
            requests: self.requests.load(Ordering::Relaxed),
            timeouts: self.timed_out.load(Ordering::Relaxed),
        }
    }

    pub fn pronouns(&self) -> &[String] {
        &self.pronouns
    }

    /// Send one line and return the raw transcript.
    ///
    /// A timed-out exchange becomes `Error::ChannelTimeout`; the engine
    /// stays usable.
    #[instrument(skip_all, fields(text = %redact_for_log(text, LOG_TEXT_LIMIT)))]
    pub fn exchange(&self, text: &str) -> Result<Transcript> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let exchange = {
            let mut channel = self.lock();
            debug!(event = event_names::REQUEST_SENT, "request sent");
            let exchange = channel.send(text, self.timeouts.as_ref());
            self.published.record(&channel);
            exchange?
        };
        if !exchange.is_complete() {
            self.timed_out.fetch_add(1, Ordering::Relaxed);
        }
        exchange.into_transcript()
    }

    /// Parse `text` as is.
    pub fn parse(&self, text: &str) -> Result<ParseResult> {
        let transcript = self.exchange(text)?;
        let result = parse_transcript(&transcript.text)?;
        info!(
            event = event_names::REQUEST_COMPLETE,
            sentences = result.sentence_count(),
            elapsed_ms = transcript.elapsed.as_millis() as u64,
            "parse complete"
        );
        Ok(result)
    }

    /// Parse `text` with a synthetic subject injected.
    pub fn parse_imperative(&self, text: &str) -> Result<ParseResult> {
        ImperativeRewriter::new(|t: &str| self.parse(t), &self.pronouns).parse(text)
    }

    /// Parse a transcript captured earlier; no engine involved.
    pub fn parse_transcript_text(raw: &str) -> Result<ParseResult> {
        parse_transcript(raw)
    }

    /// Shut the engine down.
    pub fn close(&self) {
        let mut channel = self.lock();
        channel.close();
        self.published.record(&channel);
    }

    /// Shut the engine down and report it, with request totals.
    pub fn shutdown(&self, emitter: &dyn ProgressEmitter) {
        self.close();
        let status = self.status();
        emitter.emit(
            ProgressEvent::new(events::event_names::ENGINE_CLOSED, Phase::Shutdown)
                .with_detail("requests", status.requests)
                .with_detail("timeouts", status.timeouts),
        );
    }
}

impl SentenceParser for NlpBridge {
    fn parse_sentence(&self, text: &str) -> Result<ParseResult> {
        self.parse(text)
    }
}

impl std::fmt::Debug for NlpBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NlpBridge")
            .field("command", &self.launch.command.display())
            .field("requests", &self.requests.load(Ordering::Relaxed))
            .finish()
    }
}
