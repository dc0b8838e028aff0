//! Log subscriber setup.
//!
//! `RUST_LOG` wins over the configured level. Logs always go to stderr so
//! `--stdout` output stays valid JSON.

use pktsrc_core::LogSettings;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

pub fn init_logging(settings: &LogSettings, quiet: bool) {
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if quiet {
        EnvFilter::new(Level::ERROR.as_str())
    } else {
        EnvFilter::new(parse_level(&settings.level).as_str())
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    match settings.format.as_str() {
        "json" => {
            let _ = tracing::subscriber::set_global_default(registry.with(layer.json()));
        }
        "compact" => {
            let _ = tracing::subscriber::set_global_default(registry.with(layer.compact()));
        }
        _ => {
            let _ = tracing::subscriber::set_global_default(registry.with(layer.pretty()));
        }
    }
}

pub fn is_known_format(format: &str) -> bool {
    matches!(format, "pretty" | "compact" | "json")
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}
