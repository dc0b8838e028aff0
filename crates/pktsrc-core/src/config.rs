//! Replay configuration.
//!
//! Values are merged in order: built-in defaults, an optional TOML file, then
//! `PKTSRC_*` environment variables. Callers (the CLI) apply their own flags
//! last and call [`ReplayConfig::validate`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_SNAPLEN: &str = "PKTSRC_SNAPLEN";
pub const ENV_PSEUDO_REALTIME: &str = "PKTSRC_PSEUDO_REALTIME";
pub const ENV_SYNC_INTERVAL: &str = "PKTSRC_SYNC_INTERVAL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Settings shared by every source of a run.
///
/// # Examples
/// ```
/// use pktsrc_core::ReplayConfig;
///
/// let config: ReplayConfig = toml::from_str("pseudo_realtime = 2.0").unwrap();
/// assert_eq!(config.pseudo_realtime, 2.0);
/// assert_eq!(config.snaplen, 8192);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayConfig {
    /// Global snap length reported by every source.
    #[serde(default = "default_snaplen")]
    pub snaplen: u32,
    /// Replay speed factor; 0 disables pseudo-realtime pacing.
    #[serde(default)]
    pub pseudo_realtime: f64,
    /// Trace-time interval between sync points; 0 disables periodic sync.
    #[serde(default)]
    pub remote_trace_sync_interval: f64,
    /// Whether a remote peer takes part in the replay.
    #[serde(default)]
    pub using_communication: bool,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogSettings {
    /// error, warn, info, debug or trace.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// pretty, compact or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_snaplen() -> u32 {
    8192
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            snaplen: default_snaplen(),
            pseudo_realtime: 0.0,
            remote_trace_sync_interval: 0.0,
            using_communication: false,
            log: LogSettings::default(),
        }
    }
}

impl ReplayConfig {
    /// Load defaults, then `path` (if given), then environment overrides.
    ///
    /// # Errors
    /// Returns `ConfigError` when the file cannot be read or parsed, or an
    /// environment override is not a number.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Apply `PKTSRC_*` overrides looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_SNAPLEN) {
            self.snaplen = parse_env(ENV_SNAPLEN, &value)?;
        }
        if let Some(value) = lookup(ENV_PSEUDO_REALTIME) {
            self.pseudo_realtime = parse_env(ENV_PSEUDO_REALTIME, &value)?;
        }
        if let Some(value) = lookup(ENV_SYNC_INTERVAL) {
            self.remote_trace_sync_interval = parse_env(ENV_SYNC_INTERVAL, &value)?;
        }
        Ok(())
    }

    /// Reject values the replay engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snaplen == 0 {
            return Err(ConfigError::Invalid {
                name: "snaplen",
                message: "must be positive".to_string(),
            });
        }
        check_non_negative("pseudo_realtime", self.pseudo_realtime)?;
        check_non_negative("remote_trace_sync_interval", self.remote_trace_sync_interval)?;
        Ok(())
    }

    pub fn sync_interval(&self) -> Option<f64> {
        (self.remote_trace_sync_interval > 0.0).then_some(self.remote_trace_sync_interval)
    }
}

fn check_non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Invalid {
            name,
            message: format!("expected a finite value >= 0, got {value}"),
        });
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        name,
        message: format!("{value:?}: {e}"),
    })
}
