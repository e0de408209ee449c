//! nlp-bridge - CoreNLP interactive shell bridge
//!
//! The main entry point for nlp-bridge, handling:
//! - Serving parses over JSON-RPC (HTTP or stdio)
//! - One-shot parses from the command line
//! - Offline parsing of saved transcripts
//! - Configuration and environment checks

use clap::{Args, Parser, Subcommand};
use nb_common::{Error, OutputFormat, ParseResult, SCHEMA_VERSION};
use nb_config::{load_config, BridgeConfig, LoadedConfig, ValidationError};
use nb_core::bridge::NlpBridge;
use nb_core::channel::check_resources;
use nb_core::events::{JsonlWriter, LogEmitter, ProgressEmitter};
use nb_core::exit_codes::ExitCode;
use nb_core::logging::{generate_run_id, init_logging, LogConfig, LogFormat};
use nb_core::output::render_parse;
use nb_core::relations::DependencyHierarchy;
use nb_core::service::http::HttpServer;
use nb_core::service::{stdio, Service};
use nb_core::{shutdown, transcript};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Bridge to a long-running CoreNLP interactive shell
#[derive(Parser)]
#[command(name = "nlp-bridge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to bridge.toml
    #[arg(long, global = true, env = "NLP_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Log line format on stderr (human or jsonl)
    #[arg(long, global = true, env = "NB_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the engine and serve JSON-RPC requests
    Serve(ServeArgs),

    /// Start the engine, parse one text and exit
    Parse(ParseArgs),

    /// Parse a saved engine transcript without starting the engine
    Transcript(TranscriptArgs),

    /// Validate configuration and engine resources
    Check(CheckArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Print the JSON schema of parse results
    Schema,

    /// Test whether one dependency relation is a kind of another
    Relations(RelationsArgs),

    /// Print version information
    Version,
}

// ============================================================================
// Command argument structs
// ============================================================================

#[derive(Args, Debug)]
struct ServeArgs {
    /// Read envelopes from stdin and answer on stdout instead of HTTP
    #[arg(long)]
    stdio: bool,

    /// Listen address (overrides server.host)
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides server.port)
    #[arg(long)]
    port: Option<u16>,

    /// HTTP worker threads (overrides server.workers)
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Args, Debug)]
struct ParseArgs {
    /// Text to parse
    text: String,

    /// Treat the text as a command and inject a synthetic subject
    #[arg(long)]
    imperative: bool,
}

#[derive(Args, Debug)]
struct TranscriptArgs {
    /// Transcript file, or `-` for stdin
    path: String,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Also start the engine and wait for it to become ready
    #[arg(long)]
    engine: bool,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Validate a configuration file
    Validate {
        /// Path to validate (defaults to the resolved configuration)
        path: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RelationsArgs {
    /// Relation to test, e.g. `dobj`
    relation: String,

    /// Candidate ancestor, e.g. `arg`
    ancestor: String,
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env(
        cli.global.log_format,
        cli.global.verbose,
        cli.global.quiet,
    );
    init_logging(&log_config);

    let run_id = generate_run_id();
    let span = tracing::info_span!("run", run_id = %run_id);
    let _guard = span.enter();

    let exit_code = match cli.command {
        None => {
            print_version(&cli.global);
            ExitCode::Clean
        }
        Some(Commands::Serve(args)) => run_serve(&cli.global, &args),
        Some(Commands::Parse(args)) => run_parse(&cli.global, &args),
        Some(Commands::Transcript(args)) => run_transcript(&cli.global, &args),
        Some(Commands::Check(args)) => run_check(&cli.global, &args),
        Some(Commands::Config(args)) => run_config(&cli.global, &args),
        Some(Commands::Schema) => run_schema(),
        Some(Commands::Relations(args)) => run_relations(&cli.global, &args),
        Some(Commands::Version) => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Shared helpers
// ============================================================================

fn load(global: &GlobalOpts) -> Result<LoadedConfig, ExitCode> {
    match load_config(global.config.as_deref()) {
        Ok(loaded) => {
            tracing::info!(
                event = nb_core::logging::event_names::CONFIG_LOADED,
                source = %loaded.location.source,
                snapshot = loaded.snapshot.short_id(),
                "configuration loaded"
            );
            Ok(loaded)
        }
        Err(e) => Err(output_config_error(global, &e)),
    }
}

fn progress_emitter(global: &GlobalOpts) -> Box<dyn ProgressEmitter> {
    match global.format {
        OutputFormat::Json => Box::new(JsonlWriter::new(std::io::stderr())),
        _ => Box::new(LogEmitter),
    }
}

/// Start the configured engine, reporting failures on stderr.
fn start_bridge(global: &GlobalOpts, config: &BridgeConfig) -> Result<Arc<NlpBridge>, ExitCode> {
    shutdown::install_signal_handlers();
    let bridge = Arc::new(NlpBridge::new(config));
    let emitter = progress_emitter(global);
    match bridge.start(emitter.as_ref()) {
        Ok(()) => Ok(bridge),
        Err(e) => Err(output_error(global, "start", &e)),
    }
}

fn print_result(global: &GlobalOpts, command: &str, result: &ParseResult) -> ExitCode {
    match render_parse(command, result, global.format) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::Clean
        }
        Err(e) => output_error(global, command, &e),
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("error: {}", e),
    }
}

fn output_error(global: &GlobalOpts, command: &str, error: &Error) -> ExitCode {
    let exit_code = ExitCode::for_error(error);
    tracing::error!(command, code = error.code_name(), error = %error, "command failed");
    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "command": command,
                "status": "error",
                "exit_code": exit_code.code_name(),
                "error": error.report(),
                "remediation": error.remediation(),
            });
            match serde_json::to_string_pretty(&response) {
                Ok(text) => eprintln!("{}", text),
                Err(_) => eprintln!("{}: {}", command, error),
            }
        }
        OutputFormat::Summary => {
            eprintln!("[{}] {}: {}", exit_code.code_name(), command, error);
        }
        OutputFormat::Md => {
            eprintln!("# {}", error.headline());
            eprintln!();
            eprintln!("Error: {}", error);
            eprintln!();
            eprintln!("{}", error.remediation());
        }
    }
    exit_code
}

fn output_config_error(global: &GlobalOpts, error: &ValidationError) -> ExitCode {
    let exit_code = match error {
        ValidationError::IoError(_) => ExitCode::IoError,
        _ => ExitCode::ConfigError,
    };
    tracing::error!(
        event = nb_core::logging::event_names::CONFIG_ERROR,
        code = error.code(),
        error = %error,
        "configuration rejected"
    );

    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "status": "error",
                "exit_code": exit_code.code_name(),
                "error": {
                    "code": error.code(),
                    "message": error.to_string(),
                }
            });
            match serde_json::to_string_pretty(&response) {
                Ok(text) => eprintln!("{}", text),
                Err(_) => eprintln!("config error: {}", error),
            }
        }
        OutputFormat::Summary => {
            eprintln!("[{}] config error: {}", exit_code.code_name(), error);
        }
        OutputFormat::Md => {
            eprintln!("# Configuration Error");
            eprintln!();
            eprintln!("Error: {}", error);
        }
    }

    exit_code
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_serve(global: &GlobalOpts, args: &ServeArgs) -> ExitCode {
    let loaded = match load(global) {
        Ok(l) => l,
        Err(code) => return code,
    };
    let mut server = loaded.config.server.clone();
    if let Some(host) = &args.host {
        server.host = host.clone();
    }
    if let Some(port) = args.port {
        server.port = port;
    }
    if let Some(workers) = args.workers {
        server.workers = workers;
    }

    let bridge = match start_bridge(global, &loaded.config) {
        Ok(b) => b,
        Err(code) => return code,
    };
    let service = match Service::new(bridge.clone()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!(error = %e, "method registration failed");
            bridge.close();
            return ExitCode::InternalError;
        }
    };

    let exit_code = if args.stdio {
        match stdio::run_stdio(&service) {
            Ok(handled) => {
                tracing::info!(handled, "stdin closed");
                ExitCode::Clean
            }
            Err(e) => output_error(global, "serve", &Error::Io(e)),
        }
    } else {
        match HttpServer::bind(&server.addr(), service, server.workers) {
            Ok(http) => {
                http.join();
                ExitCode::Clean
            }
            Err(e) => output_error(global, "serve", &e),
        }
    };

    bridge.shutdown(progress_emitter(global).as_ref());
    exit_code
}

fn run_parse(global: &GlobalOpts, args: &ParseArgs) -> ExitCode {
    let loaded = match load(global) {
        Ok(l) => l,
        Err(code) => return code,
    };
    let bridge = match start_bridge(global, &loaded.config) {
        Ok(b) => b,
        Err(code) => return code,
    };

    let command = if args.imperative { "parse_imperative" } else { "parse" };
    let result = if args.imperative {
        bridge.parse_imperative(&args.text)
    } else {
        bridge.parse(&args.text)
    };
    bridge.close();

    match result {
        Ok(result) => print_result(global, command, &result),
        Err(e) => output_error(global, command, &e),
    }
}

fn run_transcript(global: &GlobalOpts, args: &TranscriptArgs) -> ExitCode {
    let raw = if args.path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map(|_| buf)
    } else {
        std::fs::read_to_string(&args.path)
    };
    let raw = match raw {
        Ok(r) => r,
        Err(e) => return output_error(global, "transcript", &Error::Io(e)),
    };

    match transcript::parse_transcript(&raw) {
        Ok(result) => print_result(global, "transcript", &result),
        Err(e) => output_error(global, "transcript", &e),
    }
}

fn run_check(global: &GlobalOpts, args: &CheckArgs) -> ExitCode {
    let mut results: Vec<serde_json::Value> = Vec::new();
    let mut exit_code = ExitCode::Clean;

    let loaded = match load(global) {
        Ok(l) => l,
        Err(code) => return code,
    };
    results.push(serde_json::json!({
        "check": "config",
        "status": "ok",
        "source": loaded.location.source.to_string(),
        "path": loaded.snapshot.path,
        "snapshot": loaded.snapshot.short_id(),
    }));

    let launcher = &loaded.config.engine.launcher;
    let launcher_found = find_program(launcher).is_some();
    results.push(serde_json::json!({
        "check": "launcher",
        "status": if launcher_found { "ok" } else { "error" },
        "program": launcher,
        "path": find_program(launcher).map(|p| p.display().to_string()),
    }));
    if !launcher_found {
        exit_code = ExitCode::ResourceError;
    }

    let resources = loaded.config.engine.required_resources();
    let missing: Vec<String> = resources
        .iter()
        .filter(|p| !p.exists())
        .map(|p| p.display().to_string())
        .collect();
    results.push(serde_json::json!({
        "check": "resources",
        "status": if missing.is_empty() { "ok" } else { "error" },
        "required": resources.len(),
        "missing": missing,
    }));
    if !missing.is_empty() {
        exit_code = ExitCode::ResourceError;
    }

    if args.engine && exit_code.is_success() {
        let started = std::time::Instant::now();
        let outcome = check_resources(&resources).and_then(|_| {
            let bridge = NlpBridge::new(&loaded.config);
            let emitter = progress_emitter(global);
            let outcome = bridge.start(emitter.as_ref());
            bridge.close();
            outcome
        });
        match outcome {
            Ok(()) => results.push(serde_json::json!({
                "check": "engine",
                "status": "ok",
                "startup_ms": started.elapsed().as_millis() as u64,
            })),
            Err(e) => {
                exit_code = ExitCode::for_error(&e);
                results.push(serde_json::json!({
                    "check": "engine",
                    "status": "error",
                    "error": e.report(),
                }));
            }
        }
    }

    match global.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "schema_version": SCHEMA_VERSION,
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "status": if exit_code.is_success() { "ok" } else { "error" },
            "checks": results,
            "config": loaded.snapshot,
        })),
        OutputFormat::Summary => {
            let failed = results.iter().filter(|r| r["status"] == "error").count();
            println!(
                "[{}] {} checks, {} failed",
                exit_code.code_name(),
                results.len(),
                failed
            );
        }
        OutputFormat::Md => {
            println!("# nlp-bridge check\n");
            for r in &results {
                println!(
                    "- {}: {}",
                    r["check"].as_str().unwrap_or("?"),
                    r["status"].as_str().unwrap_or("?")
                );
            }
        }
    }
    exit_code
}

/// Locate `program` the way the OS would when spawning it.
fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.exists().then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
}

fn run_config(global: &GlobalOpts, args: &ConfigArgs) -> ExitCode {
    match &args.command {
        ConfigCommands::Show => run_config_show(global),
        ConfigCommands::Validate { path } => run_config_validate(global, path.as_deref()),
    }
}

fn run_config_show(global: &GlobalOpts) -> ExitCode {
    let loaded = match load(global) {
        Ok(l) => l,
        Err(code) => return code,
    };

    match global.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "schema_version": SCHEMA_VERSION,
            "source": loaded.location.source.to_string(),
            "path": loaded.location.path.as_ref().map(|p| p.display().to_string()),
            "snapshot": loaded.snapshot,
            "config": loaded.config,
        })),
        OutputFormat::Summary => {
            println!(
                "[{}] {} via {}",
                loaded.snapshot.short_id(),
                loaded.config.engine.main_class,
                loaded.location.source
            );
        }
        OutputFormat::Md => match loaded.config.to_toml_string() {
            Ok(toml) => {
                println!("# Configuration ({})\n", loaded.location.source);
                println!("```toml\n{}```", toml);
            }
            Err(e) => return output_config_error(global, &e),
        },
    }
    ExitCode::Clean
}

fn run_config_validate(global: &GlobalOpts, path: Option<&Path>) -> ExitCode {
    let target = path.or(global.config.as_deref());
    match load_config(target) {
        Ok(loaded) => {
            match global.format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "schema_version": SCHEMA_VERSION,
                    "status": "valid",
                    "source": loaded.location.source.to_string(),
                    "path": loaded.location.path.as_ref().map(|p| p.display().to_string()),
                })),
                _ => println!("configuration is valid ({})", loaded.location.source),
            }
            ExitCode::Clean
        }
        Err(e) => output_config_error(global, &e),
    }
}

fn run_schema() -> ExitCode {
    let schema = schemars::schema_for!(ParseResult);
    match serde_json::to_string_pretty(&schema) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::Clean
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::InternalError
        }
    }
}

fn run_relations(global: &GlobalOpts, args: &RelationsArgs) -> ExitCode {
    let hierarchy = DependencyHierarchy::standard();
    let isa = hierarchy.isa(&args.relation, &args.ancestor);
    match global.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "relation": args.relation,
            "ancestor": args.ancestor,
            "isa": isa,
            "known": hierarchy.contains(&args.relation),
            "path": hierarchy.ancestors(&args.relation),
        })),
        OutputFormat::Summary => println!("{}", isa),
        OutputFormat::Md => {
            let verdict = if isa { "is a" } else { "is not a" };
            println!("`{}` {} `{}`", args.relation, verdict, args.ancestor);
        }
    }
    ExitCode::Clean
}

fn print_version(global: &GlobalOpts) {
    let version_info = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "nlp_bridge_version": env!("CARGO_PKG_VERSION"),
        "rust_version": env!("CARGO_PKG_RUST_VERSION"),
    });

    match global.format {
        OutputFormat::Json => print_json(&version_info),
        _ => {
            println!("nlp-bridge {}", env!("CARGO_PKG_VERSION"));
            println!("schema version: {}", SCHEMA_VERSION);
        }
    }
}
