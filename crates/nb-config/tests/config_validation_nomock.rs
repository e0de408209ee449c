//! No-mock configuration validation + resolution tests.
//!
//! Covers:
//! - Validation against real TOML fixtures
//! - Resolution order (CLI > env > config dir > XDG)
//! - Snapshot hashing of the loaded file

use nb_config::resolve::{resolve_config, ConfigSource, CONFIG_FILENAME};
use nb_config::snapshot::hash_content;
use nb_config::validate::{validate_config, ValidationError};
use nb_config::{load_config, BridgeConfig};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use tempfile::TempDir;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const ENV_KEYS: &[&str] = &["NLP_BRIDGE_CONFIG", "NLP_BRIDGE_CONFIG_DIR", "XDG_CONFIG_HOME"];

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("test")
        .join("fixtures")
        .join("config")
}

fn load_fixture(name: &str) -> BridgeConfig {
    BridgeConfig::from_file(&fixtures_dir().join(name)).expect("read config fixture")
}

struct EnvGuard {
    keys: Vec<String>,
    saved: Vec<Option<String>>,
}

impl EnvGuard {
    fn new(keys: &[&str]) -> Self {
        let mut saved = Vec::with_capacity(keys.len());
        for key in keys {
            saved.push(env::var(key).ok());
            env::remove_var(key);
        }
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            saved,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (idx, key) in self.keys.iter().enumerate() {
            match self.saved.get(idx).and_then(|v| v.as_ref()) {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }
}

fn with_env_lock<T>(f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    f()
}

fn write_config(dir: &Path, port: u16) -> PathBuf {
    fs::create_dir_all(dir).expect("create config dir");
    let path = dir.join(CONFIG_FILENAME);
    fs::write(&path, format!("[server]\nport = {}\n", port)).expect("write config");
    path
}

#[test]
fn test_valid_fixture_loads_and_validates() {
    let cfg = load_fixture("bridge_valid.toml");
    validate_config(&cfg).expect("fixture should validate");

    assert_eq!(cfg.engine.jvm_args, vec!["-Xmx3g"]);
    assert_eq!(cfg.readiness.len(), 2);
    assert_eq!(cfg.readiness[0].display_name(), "POS tagger");
    assert_eq!(cfg.protocol.drain_quiet_ms, 200);
    assert_eq!(cfg.protocol.sentinel, "\nNLP>");
    assert_eq!(cfg.timeouts.budget_for(100), Duration::from_secs(8));
    assert_eq!(cfg.imperative.pronouns, vec!["you", "they"]);
    assert_eq!(cfg.server.addr(), "0.0.0.0:8090");

    let resources = cfg.engine.required_resources();
    assert_eq!(
        resources[0],
        PathBuf::from("/opt/stanford-corenlp/stanford-corenlp-2011-09-16.jar")
    );
    assert_eq!(
        resources.last().unwrap(),
        &PathBuf::from("/opt/stanford-corenlp/default.properties")
    );
}

#[test]
fn test_bad_timeouts_fixture_rejected() {
    let cfg = load_fixture("bridge_bad_timeouts.toml");
    match validate_config(&cfg) {
        Err(ValidationError::InvalidValue { field, .. }) => assert_eq!(field, "timeouts.cap_secs"),
        other => panic!("expected cap_secs error, got {:?}", other),
    }
}

#[test]
fn test_bad_pronouns_fixture_rejected() {
    let cfg = load_fixture("bridge_bad_pronouns.toml");
    let err = validate_config(&cfg).unwrap_err();
    assert_eq!(err.code(), 65);
}

#[test]
fn test_resolve_config_cli_over_env() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let temp = TempDir::new().expect("temp dir");
        let cli = write_config(&temp.path().join("cli"), 9001);
        let env_file = write_config(&temp.path().join("env"), 9002);
        env::set_var("NLP_BRIDGE_CONFIG", env_file.display().to_string());

        let resolved = resolve_config(Some(&cli));
        assert_eq!(resolved.source, ConfigSource::CliArgument);
        assert_eq!(resolved.path.unwrap(), cli);
    });
}

#[test]
fn test_resolve_config_env_over_config_dir() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let temp = TempDir::new().expect("temp dir");
        let env_file = write_config(&temp.path().join("env"), 9002);
        let dir = temp.path().join("config_dir");
        write_config(&dir, 9003);
        env::set_var("NLP_BRIDGE_CONFIG", env_file.display().to_string());
        env::set_var("NLP_BRIDGE_CONFIG_DIR", dir.display().to_string());

        let resolved = resolve_config(None);
        assert_eq!(resolved.source, ConfigSource::Environment);
        assert_eq!(resolved.path.unwrap(), env_file);

        env::remove_var("NLP_BRIDGE_CONFIG");
        let resolved = resolve_config(None);
        assert_eq!(resolved.source, ConfigSource::Environment);
        assert_eq!(resolved.path.unwrap(), dir.join(CONFIG_FILENAME));
    });
}

#[test]
fn test_resolve_config_xdg_fallback() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let temp = TempDir::new().expect("temp dir");
        let xdg_dir = temp.path().join("xdg");
        let file = write_config(&xdg_dir.join("nlp-bridge"), 9004);
        env::set_var("XDG_CONFIG_HOME", xdg_dir.display().to_string());

        let resolved = resolve_config(None);
        assert_eq!(resolved.source, ConfigSource::XdgConfig);
        assert_eq!(resolved.path.unwrap(), file);
    });
}

#[test]
fn test_load_config_snapshot_hashes_file() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let temp = TempDir::new().expect("temp dir");
        let file = write_config(temp.path(), 9005);
        let raw = fs::read_to_string(&file).unwrap();

        let loaded = load_config(Some(&file)).expect("load");
        assert_eq!(loaded.config.server.port, 9005);
        assert_eq!(loaded.snapshot.source, "CLI argument");
        assert_eq!(loaded.snapshot.file_hash.as_deref(), Some(hash_content(&raw).as_str()));
        assert_eq!(loaded.snapshot.summary.server_addr, "127.0.0.1:9005");
    });
}

#[test]
fn test_load_config_rejects_invalid_values() {
    let err = load_config(Some(&fixtures_dir().join("bridge_bad_timeouts.toml"))).unwrap_err();
    assert!(!err.is_load_error());
}
