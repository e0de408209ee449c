//! Test utilities for nb-core.
//!
//! Fake engines are small `sh` scripts that speak the interactive shell
//! protocol: they print readiness markers, a prompt, and for every request
//! line a transcript with one sentence whose tokens are the line's
//! whitespace-separated words. Request words can trigger special behavior:
//!
//! - `__slow__`: sleep before answering (see [`FakeEngine::slow_secs`])
//! - `__exit__`: exit with status 3 without answering
//! - `__twice__`: answer with two sentences

use crate::bridge::{EngineLaunch, NlpBridge};
use crate::channel::{Channel, ProcessCommand};
use crate::events::NullEmitter;
use nb_config::{ProtocolConfig, ReadinessStep};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($expr:expr, $msg:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

// ============================================================================
// Fixtures
// ============================================================================

/// Fixture directory relative to the workspace root.
pub const FIXTURES_DIR: &str = "test/fixtures";

/// Path to a fixture file.
pub fn fixture_path(relative: impl AsRef<Path>) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .join(FIXTURES_DIR)
        .join(relative)
}

/// Read a fixture file to a string, panicking with the path on failure.
pub fn load_fixture(relative: impl AsRef<Path>) -> String {
    let path = fixture_path(relative);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read fixture {}: {}", path.display(), e))
}

// ============================================================================
// Fake engine
// ============================================================================

const RESPOND_FN: &str = r#"
respond() {
  line="$1"
  n=0; off=0; words=""
  for w in $line; do
    n=$((n + 1))
    end=$((off + ${#w}))
    words="$words[Text=$w CharacterOffsetBegin=$off CharacterOffsetEnd=$end PartOfSpeech=XX] "
    off=$((end + 1))
  done
  printf 'Sentence #%d (%d tokens):\n%s\n%s\n(ROOT\n  (X %s))\n\n' "$2" "$n" "$line" "$words" "$n"
  i=0; prev=""
  for w in $line; do
    i=$((i + 1))
    if [ "$i" -gt 1 ]; then
      printf 'dep(%s-%d, %s-%d)\n' "$prev" "$((i - 1))" "$w" "$i"
    fi
    prev="$w"
  done
  printf '\n'
}
"#;

/// Builder for a scripted engine.
#[derive(Debug, Clone)]
pub struct FakeEngine {
    markers: Vec<String>,
    markers_to_stderr: bool,
    startup_delay_secs: u64,
    slow_secs: u64,
    ignore_sigterm: bool,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            markers: vec![
                "Loading tagger ... done.".to_string(),
                "Loading parser ... done.".to_string(),
                "Entering interactive shell.".to_string(),
            ],
            markers_to_stderr: false,
            startup_delay_secs: 0,
            slow_secs: 1,
            ignore_sigterm: false,
        }
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Startup lines printed before the first prompt.
    pub fn markers<S: Into<String>>(mut self, markers: impl IntoIterator<Item = S>) -> Self {
        self.markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Print startup lines on stderr, the way the real engine logs loading.
    pub fn markers_to_stderr(mut self) -> Self {
        self.markers_to_stderr = true;
        self
    }

    /// Sleep before printing anything.
    pub fn startup_delay_secs(mut self, secs: u64) -> Self {
        self.startup_delay_secs = secs;
        self
    }

    /// How long a `__slow__` request takes.
    pub fn slow_secs(mut self, secs: u64) -> Self {
        self.slow_secs = secs;
        self
    }

    /// Survive SIGTERM so shutdown has to escalate.
    pub fn ignore_sigterm(mut self) -> Self {
        self.ignore_sigterm = true;
        self
    }

    /// The `sh` script.
    pub fn script(&self) -> String {
        let mut script = String::from("set -f\n");
        if self.ignore_sigterm {
            script.push_str("trap '' TERM\n");
        }
        script.push_str(RESPOND_FN);
        if self.startup_delay_secs > 0 {
            script.push_str(&format!("sleep {}\n", self.startup_delay_secs));
        }
        let redirect = if self.markers_to_stderr { " >&2" } else { "" };
        for marker in &self.markers {
            script.push_str(&format!("printf '%s\\n' '{}'{}\n", shell_quote_body(marker), redirect));
        }
        script.push_str("printf '\\nNLP> '\n");
        script.push_str(&format!(
            r#"while IFS= read -r line; do
  case "$line" in
    *__exit__*) exit 3 ;;
    *__slow__*) sleep {slow} ;;
  esac
  respond "$line" 1
  case "$line" in
    *__twice__*) respond "$line" 2 ;;
  esac
  printf 'NLP> '
done
"#,
            slow = self.slow_secs
        ));
        script
    }

    pub fn command(&self) -> ProcessCommand {
        ProcessCommand::new("sh").arg("-c").arg(self.script())
    }

    /// One readiness step per marker, each with `timeout_secs`.
    pub fn readiness(&self, timeout_secs: u64) -> Vec<ReadinessStep> {
        self.markers
            .iter()
            .map(|m| ReadinessStep::new(m.clone(), timeout_secs))
            .collect()
    }

    pub fn launch(&self) -> EngineLaunch {
        EngineLaunch {
            command: self.command(),
            resources: Vec::new(),
            readiness: self.readiness(5),
        }
    }

    /// A started channel, panicking if startup fails.
    pub fn start_channel(&self) -> Channel {
        let mut channel = Channel::new(fast_protocol());
        let no_resources: [&Path; 0] = [];
        if let Err(e) = channel.start(&self.command(), &no_resources, &self.readiness(5), &NullEmitter) {
            panic!("fake engine failed to start: {e}");
        }
        channel
    }

    /// An unstarted bridge over this engine with a fixed response budget.
    pub fn bridge(&self, budget: Duration) -> NlpBridge {
        NlpBridge::with_launch(
            self.launch(),
            fast_protocol(),
            budget,
            vec!["you".to_string(), "he".to_string()],
        )
    }
}

/// Escape a value for use inside single quotes.
fn shell_quote_body(s: &str) -> String {
    s.replace('\'', r"'\''")
}

/// Protocol settings with short drain windows for tests.
pub fn fast_protocol() -> ProtocolConfig {
    ProtocolConfig {
        drain_quiet_ms: 50,
        drain_max_ms: 3000,
        ..ProtocolConfig::default()
    }
}
