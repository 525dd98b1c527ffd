//! Editor configuration.
//!
//! # Responsibility
//! - Hold every tunable limit of the editor core in one serde struct.
//! - Reject values that would disable history or nesting outright.
//!
//! # Invariants
//! - Missing JSON keys fall back to defaults.
//! - A validated config has non-zero limits everywhere.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const DEFAULT_MAX_DEPTH: usize = 1;
pub const DEFAULT_SNAPSHOT_INTERVAL: usize = 50;
pub const DEFAULT_MAX_SNAPSHOTS: usize = 10;
pub const DEFAULT_MAX_HISTORY: usize = 1000;
pub const DEFAULT_BATCH_WINDOW_MS: u64 = 16;

/// File logging settings consumed by [`crate::logging::init_logging`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace|debug|info|warn|error.
    pub level: String,
    /// Absolute directory for rotated log files.
    pub log_dir: String,
    pub max_file_size_bytes: u64,
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            log_dir: String::new(),
            max_file_size_bytes: 10 * 1024 * 1024,
            max_files: 5,
        }
    }
}

/// Limits for the operation manager, history and signal batching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Deepest allowed nesting level; roots sit at depth 0.
    pub max_depth: usize,
    /// Recorded entries between automatic snapshots.
    pub snapshot_interval: usize,
    pub max_snapshots: usize,
    /// Oldest undo entries are dropped past this count.
    pub max_history: usize,
    pub batch_window_ms: u64,
    pub logging: LoggingConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
            max_history: DEFAULT_MAX_HISTORY,
            batch_window_ms: DEFAULT_BATCH_WINDOW_MS,
            logging: LoggingConfig::default(),
        }
    }
}

impl EditorConfig {
    /// Parses and validates a JSON config document.
    ///
    /// # Errors
    /// - `ConfigError::Parse` for malformed JSON or mistyped fields.
    /// - `ConfigError::Invalid` when a limit is out of range.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EditorConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("max_depth", self.max_depth),
            ("snapshot_interval", self.snapshot_interval),
            ("max_snapshots", self.max_snapshots),
            ("max_history", self.max_history),
            ("logging.max_files", self.logging.max_files),
        ];
        if let Some(&(field, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid {
                field,
                message: "must be greater than zero".to_string(),
            });
        }
        if self.logging.max_file_size_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "logging.max_file_size_bytes",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }
}

/// Config loading error.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid { field, message } => write!(f, "invalid config `{field}`: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}
