use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use glob::glob;
use pktsrc_core::{ReplayConfig, ReplayReport};
use tracing::debug;

mod logging;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("PKTSRC_BUILD_COMMIT"),
    " ",
    env!("PKTSRC_BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "pktsrc")]
#[command(version = VERSION)]
#[command(
    about = "Replay packet captures through a paced packet source.",
    long_about = None,
    after_help = "Examples:\n  pktsrc replay capture.pcap -o report.json\n  pktsrc replay capture.pcapng --stdout --speed 2\n  pktsrc replay 'traces/*.pcap' --stdout --speed 1 --sync-interval 10"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a capture file and write a JSON replay report.
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// Path (or glob matching one file) to a .pcap or .pcapng capture
    input: PathBuf,

    /// Output report path (JSON)
    #[arg(short = 'o', long, required_unless_present = "stdout")]
    report: Option<PathBuf>,

    /// Write JSON report to stdout
    #[arg(long, conflicts_with = "report")]
    stdout: bool,

    /// Pretty-print JSON output
    #[arg(long, conflicts_with = "compact")]
    pretty: bool,

    /// Compact JSON output (default)
    #[arg(long)]
    compact: bool,

    /// Suppress non-error output
    #[arg(long)]
    quiet: bool,

    /// Pseudo-realtime speed factor (0 replays as fast as possible)
    #[arg(long, value_name = "X")]
    speed: Option<f64>,

    /// Trace seconds between sync points (requires --speed)
    #[arg(long, value_name = "S")]
    sync_interval: Option<f64>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level: error, warn, info, debug or trace
    #[arg(long, value_name = "L")]
    log_level: Option<String>,

    /// Log format: pretty, compact or json
    #[arg(long, value_name = "F")]
    log_format: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Replay(args) => cmd_replay(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

fn cmd_replay(args: ReplayArgs) -> Result<(), CliError> {
    let config = build_config(&args)?;
    logging::init_logging(&config.log, args.quiet);
    debug!(?config, "effective configuration");

    let resolved_input = resolve_input_path(&args.input)?;
    validate_input_file(&resolved_input)?;
    let input_abs = fs::canonicalize(&resolved_input)
        .with_context(|| format!("Failed to resolve input path: {}", resolved_input.display()))?;

    let report_path = if args.stdout {
        None
    } else {
        let path = args.report.clone().ok_or_else(|| {
            CliError::new(
                "missing output path",
                Some("use -o/--report or --stdout".to_string()),
            )
        })?;
        ensure_distinct_output(&path, &input_abs)?;
        Some(path)
    };

    let rep = pktsrc_core::replay_pcap_file(&resolved_input, &config)
        .context("capture replay failed")?;
    let json = serialize_report(&rep, args.pretty, args.compact)?;

    let Some(report_path) = report_path else {
        print!("{}", json);
        return Ok(());
    };

    if let Some(parent) = report_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
    }
    fs::write(&report_path, json)
        .with_context(|| format!("Failed to write report: {}", report_path.display()))?;

    if !args.quiet {
        print_summary(&rep);
        eprintln!("OK: report written -> {}", report_path.display());
    }
    Ok(())
}

/// Defaults, then the config file and `PKTSRC_*` variables, then flags.
fn build_config(args: &ReplayArgs) -> Result<ReplayConfig, CliError> {
    let mut config = ReplayConfig::load(args.config.as_deref()).map_err(|err| {
        CliError::new(
            err.to_string(),
            Some("check the --config file and PKTSRC_* environment variables".to_string()),
        )
    })?;

    if let Some(speed) = args.speed {
        config.pseudo_realtime = speed;
    }
    if let Some(interval) = args.sync_interval {
        config.remote_trace_sync_interval = interval;
    }
    if config.remote_trace_sync_interval > 0.0 {
        if config.pseudo_realtime <= 0.0 {
            return Err(CliError::new(
                "sync points need a pseudo-realtime replay",
                Some("add --speed with a positive factor".to_string()),
            ));
        }
        config.using_communication = true;
    }
    if let Some(level) = args.log_level.as_ref() {
        config.log.level = level.clone();
    }
    if let Some(format) = args.log_format.as_ref() {
        config.log.format = format.clone();
    }
    if !logging::is_known_format(&config.log.format) {
        return Err(CliError::new(
            format!("unknown log format '{}'", config.log.format),
            Some("use pretty, compact or json".to_string()),
        ));
    }

    config
        .validate()
        .map_err(|err| CliError::new(err.to_string(), None))?;
    Ok(config)
}

fn ensure_distinct_output(report_path: &Path, input_abs: &Path) -> Result<(), CliError> {
    let report_dir = match report_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::canonicalize(parent),
        _ => fs::canonicalize("."),
    };
    // A missing output directory is created later and cannot hold the input.
    let Ok(report_dir) = report_dir else {
        return Ok(());
    };
    let file_name = report_path
        .file_name()
        .ok_or_else(|| CliError::new("invalid report path", None))?;
    if report_dir.join(file_name) == input_abs {
        return Err(CliError::new(
            format!("report path must differ from input: {}", report_path.display()),
            Some("choose a different output path".to_string()),
        ));
    }
    Ok(())
}

fn serialize_report(rep: &ReplayReport, pretty: bool, compact: bool) -> Result<String, CliError> {
    if pretty && compact {
        return Err(CliError::new(
            "cannot use --pretty and --compact together",
            Some("choose one output format".to_string()),
        ));
    }
    if pretty {
        serde_json::to_string_pretty(rep)
            .context("JSON serialization failed")
            .map_err(Into::into)
    } else {
        serde_json::to_string(rep)
            .context("JSON serialization failed")
            .map_err(Into::into)
    }
}

fn print_summary(rep: &ReplayReport) {
    if let Some(summary) = rep.capture_summary.as_ref() {
        eprintln!(
            "Packets: {} accepted, {} rejected",
            summary.packets_accepted, summary.packets_rejected
        );
    }
    for weird in &rep.weirds {
        eprintln!("  {} ({})", weird.name, weird.count);
    }
    if let Some(replay) = rep.replay.as_ref() {
        eprintln!(
            "Replay: speed {}, {} sync points",
            replay.speed, replay.sync_points
        );
    }
}

fn validate_input_file(input: &Path) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    if !input.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    let ext = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ext != "pcap" && ext != "pcapng" {
        return Err(CliError::new(
            format!("unsupported input format '{}'", input.display()),
            Some("expected a .pcap or .pcapng file".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    let mut matches = Vec::new();
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    match matches.len() {
        0 => Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some("check the path or quote the pattern; expected .pcap or .pcapng".to_string()),
        )),
        1 => Ok(matches.remove(0)),
        count => {
            let mut listed = matches
                .iter()
                .take(3)
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            if count > 3 {
                listed.push_str(", ...");
            }
            Err(CliError::new(
                format!(
                    "multiple files match pattern '{}' ({} matches); matches: {}",
                    pattern, count, listed
                ),
                Some("pass a single capture file, or run once per file".to_string()),
            ))
        }
    }
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
