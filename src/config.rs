//! Configuration file parser for ~/.config/curator/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted but logged as warnings, since they are most
//! likely typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A value parsed but is out of range.
    #[error("Invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file. `None` means `<config dir>/curator.db`.
    pub database_path: Option<PathBuf>,

    /// Seconds between poll ticks.
    pub poll_interval_secs: u64,

    /// Maximum feeds polled per tick (and concurrently).
    pub concurrency: usize,

    /// Per-request timeout for feed downloads, in seconds.
    pub request_timeout_secs: u64,

    /// Largest feed body accepted, in bytes.
    pub max_feed_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            poll_interval_secs: 60,
            concurrency: 10,
            request_timeout_secs: 10,
            max_feed_bytes: crate::feed::fetcher::DEFAULT_MAX_FEED_SIZE,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 5] = [
        "database_path",
        "poll_interval_secs",
        "concurrency",
        "request_timeout_secs",
        "max_feed_bytes",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to bound memory use
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            interval_secs = config.poll_interval_secs,
            concurrency = config.concurrency,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Reject values the poller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "poll_interval_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_feed_bytes == 0 {
            return Err(ConfigError::Invalid {
                key: "max_feed_bytes",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================
