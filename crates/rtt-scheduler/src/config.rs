//! Scheduler configuration.
//!
//! # Config File Format
//!
//! ```toml
//! [scheduler]
//! background_exec_gap_ms = 1800000
//! hardware_timeout_ms = 5000
//! max_peers_per_request = 10
//! max_queued_per_uid = 20
//! resolver_timeout_ms = 2000
//! ```
//!
//! Missing keys take their defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BACKGROUND_EXEC_GAP_MS: u64 = 30 * 60 * 1000;
pub const DEFAULT_HARDWARE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_PEERS_PER_REQUEST: usize = 10;
pub const DEFAULT_MAX_QUEUED_PER_UID: usize = 20;
pub const DEFAULT_RESOLVER_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Minimum gap between dispatches billed to the same background uid.
    pub background_exec_gap_ms: u64,
    /// Deadline after dispatch before the operation times out.
    pub hardware_timeout_ms: u64,
    pub max_peers_per_request: usize,
    /// Queue cap per attributed uid; the active operation counts.
    pub max_queued_per_uid: usize,
    /// Bound on one peer handle lookup (runtime only).
    pub resolver_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            background_exec_gap_ms: DEFAULT_BACKGROUND_EXEC_GAP_MS,
            hardware_timeout_ms: DEFAULT_HARDWARE_TIMEOUT_MS,
            max_peers_per_request: DEFAULT_MAX_PEERS_PER_REQUEST,
            max_queued_per_uid: DEFAULT_MAX_QUEUED_PER_UID,
            resolver_timeout_ms: DEFAULT_RESOLVER_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    scheduler: SchedulerConfig,
}

impl SchedulerConfig {
    /// Load and validate configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        file.scheduler.validate()?;
        Ok(file.scheduler)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, bool); 5] = [
            ("background_exec_gap_ms", self.background_exec_gap_ms > 0),
            ("hardware_timeout_ms", self.hardware_timeout_ms > 0),
            ("max_peers_per_request", self.max_peers_per_request > 0),
            ("max_queued_per_uid", self.max_queued_per_uid > 0),
            ("resolver_timeout_ms", self.resolver_timeout_ms > 0),
        ];
        for (field, ok) in checks {
            if !ok {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Config for fast tests.
    pub fn for_testing() -> Self {
        Self {
            background_exec_gap_ms: 1_000,
            hardware_timeout_ms: 100,
            resolver_timeout_ms: 50,
            ..Self::default()
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read config {path}: {error}")]
    Io { path: String, error: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
