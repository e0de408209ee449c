//! Logging configuration.
//!
//! The level starts from `NB_LOG` (or the most verbose level named in
//! `RUST_LOG`), defaults to info, and moves one step per `-v`; `-q` drops it
//! two steps. The format comes from `--log-format` / `NB_LOG_FORMAT`, which
//! clap resolves before we get here.

use clap::ValueEnum;
use tracing_subscriber::filter::LevelFilter;

/// Log line format on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable console format.
    #[default]
    Human,
    /// One JSON object per line.
    #[value(alias = "json")]
    Jsonl,
}

/// Most to least verbose.
const LEVELS: [LevelFilter; 6] = [
    LevelFilter::TRACE,
    LevelFilter::DEBUG,
    LevelFilter::INFO,
    LevelFilter::WARN,
    LevelFilter::ERROR,
    LevelFilter::OFF,
];

/// Steps `-q` moves the level: info becomes error.
const QUIET_STEPS: u8 = 2;

/// Resolved logging setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LevelFilter,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Human,
            level: LevelFilter::INFO,
        }
    }
}

impl LogConfig {
    /// Resolve from the process environment and CLI flags.
    pub fn from_env(format: Option<LogFormat>, verbose: u8, quiet: bool) -> Self {
        Self::resolve(|key| std::env::var(key).ok(), format, verbose, quiet)
    }

    /// Resolve with `lookup` standing in for the environment.
    pub fn resolve(
        lookup: impl Fn(&str) -> Option<String>,
        format: Option<LogFormat>,
        verbose: u8,
        quiet: bool,
    ) -> Self {
        let base = lookup("NB_LOG")
            .and_then(|v| v.trim().parse::<LevelFilter>().ok())
            .or_else(|| lookup("RUST_LOG").and_then(|v| most_verbose_directive(&v)))
            .unwrap_or(LevelFilter::INFO);
        let quiet_steps = if quiet { QUIET_STEPS } else { 0 };
        Self {
            format: format.unwrap_or_default(),
            level: shift_level(base, verbose, quiet_steps),
        }
    }
}

/// Most verbose level in a `RUST_LOG` directive list such as
/// `warn,nb_core=debug`.
fn most_verbose_directive(spec: &str) -> Option<LevelFilter> {
    spec.split(',')
        .filter_map(|directive| directive.rsplit('=').next())
        .filter_map(|level| level.trim().parse::<LevelFilter>().ok())
        .max()
}

fn shift_level(level: LevelFilter, louder: u8, quieter: u8) -> LevelFilter {
    let idx = LEVELS.iter().position(|l| *l == level).unwrap_or(2) as i32;
    let shifted = (idx - louder as i32 + quieter as i32).clamp(0, LEVELS.len() as i32 - 1);
    LEVELS[shifted as usize]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_human_info() {
        let config = LogConfig::resolve(env(&[]), None, 0, false);
        assert_eq!(config, LogConfig::default());
    }

    #[test]
    fn nb_log_wins_over_rust_log() {
        let config = LogConfig::resolve(
            env(&[("NB_LOG", "warn"), ("RUST_LOG", "trace")]),
            None,
            0,
            false,
        );
        assert_eq!(config.level, LevelFilter::WARN);
    }

    #[test]
    fn rust_log_takes_most_verbose_directive() {
        assert_eq!(
            most_verbose_directive("warn,nb_core=debug,tiny_http"),
            Some(LevelFilter::DEBUG)
        );
        assert_eq!(most_verbose_directive("nb_core"), None);

        let config = LogConfig::resolve(env(&[("RUST_LOG", "nb_core=trace")]), None, 0, false);
        assert_eq!(config.level, LevelFilter::TRACE);
    }

    #[test]
    fn unparseable_nb_log_falls_through() {
        let config = LogConfig::resolve(
            env(&[("NB_LOG", "chatty"), ("RUST_LOG", "error")]),
            None,
            0,
            false,
        );
        assert_eq!(config.level, LevelFilter::ERROR);
    }

    #[test]
    fn verbose_and_quiet_shift_the_level() {
        let none = env(&[]);
        assert_eq!(LogConfig::resolve(&none, None, 1, false).level, LevelFilter::DEBUG);
        assert_eq!(LogConfig::resolve(&none, None, 5, false).level, LevelFilter::TRACE);
        assert_eq!(LogConfig::resolve(&none, None, 0, true).level, LevelFilter::ERROR);
        assert_eq!(LogConfig::resolve(&none, None, 1, true).level, LevelFilter::WARN);
        assert_eq!(shift_level(LevelFilter::ERROR, 0, 9), LevelFilter::OFF);
    }

    #[test]
    fn format_from_cli_value() {
        assert_eq!(LogFormat::from_str("jsonl", true), Ok(LogFormat::Jsonl));
        assert_eq!(LogFormat::from_str("json", true), Ok(LogFormat::Jsonl));
        assert!(LogFormat::from_str("xml", true).is_err());

        let config = LogConfig::resolve(env(&[]), Some(LogFormat::Jsonl), 0, false);
        assert_eq!(config.format, LogFormat::Jsonl);
    }
}
