//! Interactive engine channel.
//!
//! A [`Channel`] owns exactly one engine process and runs one
//! request/response exchange at a time:
//!
//! 1. `start` spawns the process and waits for each readiness marker in turn,
//!    each with its own deadline.
//! 2. `send` discards stale output, writes one request line and collects
//!    output until the prompt sentinel appears or the response budget runs
//!    out.
//! 3. `close` shuts the process down (SIGTERM, then SIGKILL after a grace
//!    period).
//!
//! Output is read by one blocking thread per pipe; the channel itself only
//! ever waits on an `mpsc` receiver with a deadline. The channel does not
//! queue: callers serialize access (see `bridge::NlpBridge`).

pub mod command;
pub mod stream;
pub mod timeout;

pub use command::{check_resources, ProcessCommand};
pub use stream::{StreamEvent, StreamKind, Utf8Decoder};
pub use timeout::TimeoutPolicy;

use crate::events::{self, Phase, ProgressEmitter, ProgressEvent};
use crate::logging::event_names;
use nb_common::{Error, Result};
use nb_config::{ProtocolConfig, ReadinessStep};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::process::{Child, ChildStdin, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, trace, warn};

/// Time between SIGTERM and SIGKILL.
const SIGTERM_GRACE_MS: u64 = 500;

/// Poll interval while waiting for the process to exit after SIGTERM.
const REAP_POLL_MS: u64 = 10;

/// How long `close` waits for the reader threads to see EOF.
const READER_JOIN_MS: u64 = 1000;

/// Lifecycle of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    Unstarted,
    Starting,
    Ready,
    Closed,
    Failed,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Unstarted => "unstarted",
            ChannelState::Starting => "starting",
            ChannelState::Ready => "ready",
            ChannelState::Closed => "closed",
            ChannelState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw engine output for one request, sentinel excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub elapsed: Duration,
}

/// Outcome of [`Channel::send`].
///
/// A timeout is a value, not an error: the channel stays ready and the
/// late answer is discarded before the next request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    Complete(Transcript),
    TimedOut { partial: String, elapsed: Duration },
}

impl Exchange {
    pub fn is_complete(&self) -> bool {
        matches!(self, Exchange::Complete(_))
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            Exchange::Complete(t) => t.elapsed,
            Exchange::TimedOut { elapsed, .. } => *elapsed,
        }
    }

    /// Convert a timeout into `Error::ChannelTimeout`.
    pub fn into_transcript(self) -> Result<Transcript> {
        match self {
            Exchange::Complete(t) => Ok(t),
            Exchange::TimedOut { partial, elapsed } => Err(Error::ChannelTimeout {
                elapsed,
                partial_bytes: partial.len(),
            }),
        }
    }
}

/// Result of one wait on the reader channel.
enum Pump {
    Progress,
    Idle,
    Eof,
}

/// A live engine process and its pipes.
struct Engine {
    child: Child,
    stdin: Option<ChildStdin>,
    rx: Receiver<StreamEvent>,
    readers: Vec<JoinHandle<()>>,
    decoders: [Utf8Decoder; 2],
    open: [bool; 2],
}

impl Engine {
    fn spawn(command: &ProcessCommand, chunk_bytes: usize) -> Result<Self> {
        let mut cmd = command.to_command();
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group so shutdown reaches launcher children too.
            cmd.process_group(0);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::SpawnFailed(format!("{}: {}", command.program, e)))?;

        crate::shutdown::track_engine(child.id());
        let stdin = child.stdin.take();
        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::with_capacity(2);
        let mut open = [false; 2];

        if let Some(out) = child.stdout.take() {
            readers.push(stream::spawn_reader(out, StreamKind::Stdout, chunk_bytes, tx.clone())?);
            open[StreamKind::Stdout.index()] = true;
        }
        if let Some(err) = child.stderr.take() {
            readers.push(stream::spawn_reader(err, StreamKind::Stderr, chunk_bytes, tx)?);
            open[StreamKind::Stderr.index()] = true;
        }

        Ok(Self {
            child,
            stdin,
            rx,
            readers,
            decoders: [Utf8Decoder::new(), Utf8Decoder::new()],
            open,
        })
    }

    fn pid(&self) -> u32 {
        self.child.id()
    }

    fn all_closed(&self) -> bool {
        !self.open.iter().any(|o| *o)
    }

    /// Wait up to `wait` for one reader event and decode it into `buffer`.
    fn pump(&mut self, buffer: &mut String, wait: Duration, keep_stderr: bool) -> Pump {
        if self.all_closed() {
            return Pump::Eof;
        }
        match self.rx.recv_timeout(wait) {
            Ok(StreamEvent::Data { stream, bytes }) => {
                if stream == StreamKind::Stdout || keep_stderr {
                    self.decoders[stream.index()].decode_into(&bytes, buffer);
                }
                Pump::Progress
            }
            Ok(StreamEvent::Closed(stream)) => {
                self.open[stream.index()] = false;
                if stream == StreamKind::Stdout || keep_stderr {
                    self.decoders[stream.index()].finish(buffer);
                }
                trace!(%stream, "engine stream closed");
                if self.all_closed() {
                    Pump::Eof
                } else {
                    Pump::Progress
                }
            }
            Err(RecvTimeoutError::Timeout) => Pump::Idle,
            Err(RecvTimeoutError::Disconnected) => {
                self.open = [false; 2];
                Pump::Eof
            }
        }
    }

    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "engine stdin already closed")
        })?;
        stdin.write_all(line.as_bytes())?;
        stdin.flush()
    }

    /// Stop the process and reap it. Returns the exit code if it exited
    /// normally.
    fn terminate(mut self) -> Option<i32> {
        // EOF on stdin ends the interactive shell on its own.
        drop(self.stdin.take());
        let status = self.kill_with_grace();
        crate::shutdown::untrack_engine(self.pid());
        self.join_readers();
        status.and_then(|s| s.code())
    }

    #[cfg(unix)]
    fn kill_with_grace(&mut self) -> Option<ExitStatus> {
        let pgid = self.child.id() as i32;
        let status = match self.child.try_wait() {
            Ok(Some(status)) => Some(status),
            _ => {
                unsafe {
                    libc::kill(-pgid, libc::SIGTERM);
                }
                let deadline = Instant::now() + Duration::from_millis(SIGTERM_GRACE_MS);
                let mut exited = None;
                while Instant::now() < deadline {
                    if let Ok(Some(status)) = self.child.try_wait() {
                        exited = Some(status);
                        break;
                    }
                    thread::sleep(Duration::from_millis(REAP_POLL_MS));
                }
                match exited {
                    Some(status) => Some(status),
                    None => {
                        warn!(pid = pgid, "engine ignored SIGTERM, sending SIGKILL");
                        unsafe {
                            libc::kill(-pgid, libc::SIGKILL);
                        }
                        self.child.wait().ok()
                    }
                }
            }
        };
        // Children of the launcher may still hold the pipes open.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
        status
    }

    #[cfg(not(unix))]
    fn kill_with_grace(&mut self) -> Option<ExitStatus> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status),
            _ => {
                let _ = self.child.kill();
                self.child.wait().ok()
            }
        }
    }

    fn join_readers(&mut self) {
        let deadline = Instant::now() + Duration::from_millis(READER_JOIN_MS);
        while !self.all_closed() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match self.rx.recv_timeout(deadline - now) {
                Ok(StreamEvent::Closed(stream)) => self.open[stream.index()] = false,
                Ok(StreamEvent::Data { .. }) => {}
                Err(_) => break,
            }
        }
        for handle in self.readers.drain(..) {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                warn!("engine reader thread still blocked, detaching");
            }
        }
    }
}

/// Owner of one interactive engine process.
pub struct Channel {
    protocol: ProtocolConfig,
    state: ChannelState,
    engine: Option<Engine>,
    buffer: String,
    /// Sentinels still owed by requests that timed out.
    owed_sentinels: usize,
    /// The first request after startup waits out the initial prompt.
    settling: bool,
}

impl Channel {
    pub fn new(protocol: ProtocolConfig) -> Self {
        Self {
            protocol,
            state: ChannelState::Unstarted,
            engine: None,
            buffer: String::new(),
            owed_sentinels: 0,
            settling: false,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ChannelState::Ready
    }

    /// OS pid of the engine while one is running.
    pub fn pid(&self) -> Option<u32> {
        self.engine.as_ref().map(Engine::pid)
    }

    pub fn protocol(&self) -> &ProtocolConfig {
        &self.protocol
    }

    /// Spawn the engine and block until every readiness marker has been
    /// seen, in order.
    ///
    /// Any running engine is closed first, so this is also the way back
    /// from `Failed` or `Closed`.
    #[instrument(skip_all, fields(program = %command.program, markers = markers.len()))]
    pub fn start<P: AsRef<Path>>(
        &mut self,
        command: &ProcessCommand,
        resources: &[P],
        markers: &[ReadinessStep],
        emitter: &dyn ProgressEmitter,
    ) -> Result<()> {
        if self.engine.is_some() {
            self.close();
        }
        self.buffer.clear();
        self.owed_sentinels = 0;
        self.settling = false;

        if let Err(e) = check_resources(resources) {
            self.state = ChannelState::Failed;
            warn!(event = event_names::ENGINE_FAILED, error = %e, "engine resources missing");
            return Err(e);
        }

        self.state = ChannelState::Starting;
        let started = Instant::now();
        let engine = match Engine::spawn(command, self.protocol.read_chunk_bytes) {
            Ok(engine) => engine,
            Err(e) => {
                self.state = ChannelState::Failed;
                warn!(event = event_names::ENGINE_FAILED, error = %e, "engine spawn failed");
                return Err(e);
            }
        };
        let pid = engine.pid();
        self.engine = Some(engine);
        info!(
            event = event_names::ENGINE_SPAWNED,
            pid,
            command = %command.display(),
            "engine spawned"
        );
        let total = markers.len() as u64;
        emitter.emit(
            ProgressEvent::new(events::event_names::ENGINE_SPAWNED, Phase::Startup)
                .with_progress(0, Some(total))
                .with_detail("pid", pid),
        );

        let mut satisfied_at = 0;
        for (idx, step) in markers.iter().enumerate() {
            match self.wait_for_marker(step, satisfied_at) {
                Ok(end) => {
                    satisfied_at = end;
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    debug!(
                        event = event_names::ENGINE_MARKER,
                        step = idx + 1,
                        label = step.display_name(),
                        elapsed_ms,
                        "readiness marker seen"
                    );
                    emitter.emit(
                        ProgressEvent::new(events::event_names::ENGINE_MARKER_SEEN, Phase::Startup)
                            .with_progress(idx as u64 + 1, Some(total))
                            .with_elapsed_ms(elapsed_ms)
                            .with_detail("label", step.display_name()),
                    );
                }
                Err(e) => {
                    warn!(
                        event = event_names::ENGINE_FAILED,
                        step = idx + 1,
                        label = step.display_name(),
                        error = %e,
                        "engine startup failed"
                    );
                    emitter.emit(
                        ProgressEvent::new(events::event_names::ENGINE_FAILED, Phase::Startup)
                            .with_progress(idx as u64, Some(total))
                            .with_elapsed_ms(started.elapsed().as_millis() as u64)
                            .with_detail("error", e.code_name()),
                    );
                    self.fail();
                    return Err(e);
                }
            }
        }

        // Whatever followed the last marker is stale; the first send drains it.
        self.buffer.drain(..satisfied_at);
        self.settling = true;
        self.state = ChannelState::Ready;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(event = event_names::ENGINE_READY, pid, elapsed_ms, "engine ready");
        emitter.emit(
            ProgressEvent::new(events::event_names::ENGINE_READY, Phase::Startup)
                .with_progress(total, Some(total))
                .with_elapsed_ms(elapsed_ms),
        );
        Ok(())
    }

    /// Byte offset just past `step.marker`, searching from `from`.
    fn wait_for_marker(&mut self, step: &ReadinessStep, from: usize) -> Result<usize> {
        let started = Instant::now();
        let deadline = started + Duration::from_secs(step.timeout_secs);
        loop {
            if let Some(pos) = find_after(&self.buffer, from, &step.marker) {
                return Ok(pos + step.marker.len());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::InitializationTimeout {
                    marker: step.marker.clone(),
                    elapsed: now - started,
                });
            }
            let Some(engine) = self.engine.as_mut() else {
                return Err(Error::ProcessCrashed { status: None });
            };
            if let Pump::Eof = engine.pump(&mut self.buffer, deadline - now, true) {
                // Pick up a marker that arrived with the final chunk.
                if let Some(pos) = find_after(&self.buffer, from, &step.marker) {
                    return Ok(pos + step.marker.len());
                }
                return Err(self.crashed());
            }
        }
    }

    /// Run one request/response exchange.
    #[instrument(skip_all, fields(chars = text.chars().count()))]
    pub fn send(&mut self, text: &str, policy: &dyn TimeoutPolicy) -> Result<Exchange> {
        if self.state != ChannelState::Ready {
            return Err(Error::NotReady {
                state: self.state.to_string(),
            });
        }

        self.drain_stale()?;

        let line = format!("{}{}", single_line(text), self.protocol.line_terminator);
        let Some(engine) = self.engine.as_mut() else {
            return Err(self.crashed());
        };
        if let Err(e) = engine.write_line(&line) {
            debug!(error = %e, "engine stdin write failed");
            return Err(self.crashed());
        }

        let budget = policy.budget(text);
        let started = Instant::now();
        let deadline = started + budget;
        let sentinel_len = self.protocol.sentinel.len();
        let keep_stderr = self.protocol.merge_stderr;
        let mut scanned = 0;
        trace!(budget_ms = budget.as_millis() as u64, "request written");

        loop {
            if let Some(pos) = find_after(&self.buffer, scanned, &self.protocol.sentinel) {
                if self.owed_sentinels > 0 {
                    // Late answer to an earlier request that timed out.
                    let end = pos + sentinel_len;
                    self.buffer.drain(..end);
                    self.owed_sentinels -= 1;
                    scanned = 0;
                    debug!(
                        event = event_names::ENGINE_DRAINED,
                        bytes = end,
                        owed = self.owed_sentinels,
                        "skipped late engine answer"
                    );
                    continue;
                }
                let text = self.buffer[..pos].to_string();
                self.buffer.drain(..pos + sentinel_len);
                let elapsed = started.elapsed();
                debug!(
                    event = event_names::REQUEST_COMPLETE,
                    bytes = text.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "engine answered"
                );
                return Ok(Exchange::Complete(Transcript { text, elapsed }));
            }
            scanned = self.buffer.len().saturating_sub(sentinel_len);

            let now = Instant::now();
            if now >= deadline {
                let partial = split_partial(&mut self.buffer, sentinel_len);
                let elapsed = now - started;
                self.owed_sentinels += 1;
                warn!(
                    event = event_names::REQUEST_TIMEOUT,
                    partial_bytes = partial.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "engine did not answer in time"
                );
                return Ok(Exchange::TimedOut { partial, elapsed });
            }

            let Some(engine) = self.engine.as_mut() else {
                return Err(self.crashed());
            };
            if let Pump::Eof = engine.pump(&mut self.buffer, deadline - now, keep_stderr) {
                if find_after(&self.buffer, scanned, &self.protocol.sentinel).is_none() {
                    return Err(self.crashed());
                }
            }
        }
    }

    /// Discard output left over from earlier exchanges.
    ///
    /// After a timeout the late answer is awaited up to its sentinel, bounded
    /// by `drain_max`, then output is discarded until `drain_quiet` passes
    /// without any. If a late answer is still unfinished when `drain_max`
    /// runs out, the debt is kept and the buffer left intact: `send` skips
    /// that answer when its sentinel arrives. The first request after
    /// startup gets the quiet window too, so the initial prompt is not
    /// mistaken for an answer. After a clean exchange only output that is
    /// already buffered is discarded.
    fn drain_stale(&mut self) -> Result<usize> {
        let hard_deadline = Instant::now() + self.protocol.drain_max();
        let quiet = if self.owed_sentinels > 0 || self.settling {
            self.protocol.drain_quiet()
        } else {
            Duration::ZERO
        };
        self.settling = false;
        let keep_stderr = self.protocol.merge_stderr;
        let sentinel_len = self.protocol.sentinel.len();
        let mut discarded = 0;

        while self.owed_sentinels > 0 {
            if let Some(pos) = find_after(&self.buffer, 0, &self.protocol.sentinel) {
                let end = pos + sentinel_len;
                discarded += end;
                self.buffer.drain(..end);
                self.owed_sentinels -= 1;
                continue;
            }
            let now = Instant::now();
            if now >= hard_deadline {
                warn!(
                    owed = self.owed_sentinels,
                    buffered = self.buffer.len(),
                    "late engine answer still pending, next request will skip it"
                );
                return Ok(discarded);
            }
            let Some(engine) = self.engine.as_mut() else {
                return Err(self.crashed());
            };
            if let Pump::Eof = engine.pump(&mut self.buffer, hard_deadline - now, keep_stderr) {
                return Err(self.crashed());
            }
        }

        discarded += self.buffer.len();
        self.buffer.clear();
        loop {
            let now = Instant::now();
            if now >= hard_deadline {
                break;
            }
            let wait = quiet.min(hard_deadline.saturating_duration_since(now));
            let Some(engine) = self.engine.as_mut() else {
                return Err(self.crashed());
            };
            match engine.pump(&mut self.buffer, wait, keep_stderr) {
                Pump::Progress => {
                    discarded += self.buffer.len();
                    self.buffer.clear();
                }
                Pump::Idle => break,
                Pump::Eof => return Err(self.crashed()),
            }
        }

        if discarded > 0 {
            debug!(event = event_names::ENGINE_DRAINED, bytes = discarded, "discarded stale engine output");
        }
        Ok(discarded)
    }

    /// Sentinels still owed by timed-out requests.
    pub fn owed_sentinels(&self) -> usize {
        self.owed_sentinels
    }

    /// Tear the process down and mark the channel failed.
    fn crashed(&mut self) -> Error {
        let status = self.engine.take().and_then(Engine::terminate);
        self.state = ChannelState::Failed;
        self.buffer.clear();
        warn!(event = event_names::ENGINE_FAILED, ?status, "engine process exited");
        Error::ProcessCrashed { status }
    }

    fn fail(&mut self) {
        if let Some(engine) = self.engine.take() {
            engine.terminate();
        }
        self.buffer.clear();
        self.state = ChannelState::Failed;
    }

    /// Terminate the engine. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(engine) = self.engine.take() {
            let pid = engine.pid();
            let status = engine.terminate();
            info!(event = event_names::ENGINE_CLOSED, pid, ?status, "engine closed");
        }
        self.buffer.clear();
        self.owed_sentinels = 0;
        if self.state != ChannelState::Failed {
            self.state = ChannelState::Closed;
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("state", &self.state)
            .field("pid", &self.pid())
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

/// Find `needle` in `haystack` at or after byte `from`.
///
/// `from` is moved back to a character boundary first.
pub fn find_after(haystack: &str, from: usize, needle: &str) -> Option<usize> {
    let mut start = from.min(haystack.len());
    while !haystack.is_char_boundary(start) {
        start -= 1;
    }
    haystack[start..].find(needle).map(|pos| start + pos)
}

/// Take the timed-out part of `buffer`, leaving the last
/// `sentinel_len - 1` bytes behind so a sentinel split across reads still
/// matches once the rest arrives.
fn split_partial(buffer: &mut String, sentinel_len: usize) -> String {
    let mut split = buffer.len().saturating_sub(sentinel_len.saturating_sub(1));
    while !buffer.is_char_boundary(split) {
        split -= 1;
    }
    buffer.drain(..split).collect()
}

/// The engine reads one request per line; embedded line breaks become
/// spaces so character offsets are unchanged.
fn single_line(text: &str) -> String {
    text.chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}
