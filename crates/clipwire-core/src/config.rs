//! Configuration system for clipwire.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $CLIPWIRE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/clipwire/config.toml
//!   3. ~/.config/clipwire/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::packet::{ACK_TIMEOUT_SECS, CHUNK_SIZE, POLL_INTERVAL_MS};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipwireConfig {
    pub transfer: TransferSettings,
    pub channel: ChannelSettings,
    pub archive: ArchiveSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    /// Characters of encoded text per chunk.
    pub chunk_size: usize,
    /// Seconds to wait for an ack before re-writing the chunk.
    pub ack_timeout_secs: u64,
    /// Milliseconds between channel reads.
    pub poll_interval_ms: u64,
    /// Re-writes of one chunk before the peer is declared unresponsive.
    /// 0 = retry forever.
    pub max_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    /// Backend name. "auto" = first clipboard tool found.
    pub backend: String,
    /// Slot file for the "file" backend.
    pub file_path: PathBuf,
    /// Pause after clearing the channel on startup.
    pub settle_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveSettings {
    /// Archivers to probe, in order of preference.
    pub preferred: Vec<String>,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ClipwireConfig {
    fn default() -> Self {
        Self {
            transfer: TransferSettings::default(),
            channel: ChannelSettings::default(),
            archive: ArchiveSettings::default(),
        }
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            ack_timeout_secs: ACK_TIMEOUT_SECS,
            poll_interval_ms: POLL_INTERVAL_MS,
            max_retries: 0,
        }
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            backend: "auto".to_string(),
            file_path: PathBuf::new(),
            settle_delay_ms: 500,
        }
    }
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            preferred: vec!["7z".to_string(), "tar.xz".to_string(), "zip".to_string()],
        }
    }
}

impl TransferSettings {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Retry ceiling, or `None` for unbounded retries.
    pub fn retry_limit(&self) -> Option<u32> {
        (self.max_retries > 0).then_some(self.max_retries)
    }
}

impl ChannelSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("clipwire")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir())
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: &'static str },
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl ClipwireConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            ClipwireConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file, filling missing keys with defaults.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("CLIPWIRE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&ClipwireConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply CLIPWIRE_* overrides. `lookup` resolves a variable name,
    /// normally from the process environment.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("CLIPWIRE_TRANSFER__CHUNK_SIZE").and_then(|v| v.parse().ok()) {
            self.transfer.chunk_size = v;
        }
        if let Some(v) = lookup("CLIPWIRE_TRANSFER__ACK_TIMEOUT_SECS").and_then(|v| v.parse().ok())
        {
            self.transfer.ack_timeout_secs = v;
        }
        if let Some(v) = lookup("CLIPWIRE_TRANSFER__POLL_INTERVAL_MS").and_then(|v| v.parse().ok())
        {
            self.transfer.poll_interval_ms = v;
        }
        if let Some(v) = lookup("CLIPWIRE_TRANSFER__MAX_RETRIES").and_then(|v| v.parse().ok()) {
            self.transfer.max_retries = v;
        }
        if let Some(v) = lookup("CLIPWIRE_CHANNEL__BACKEND") {
            self.channel.backend = v;
        }
        if let Some(v) = lookup("CLIPWIRE_CHANNEL__FILE_PATH") {
            self.channel.file_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("CLIPWIRE_CHANNEL__SETTLE_DELAY_MS").and_then(|v| v.parse().ok())
        {
            self.channel.settle_delay_ms = v;
        }
        if let Some(v) = lookup("CLIPWIRE_ARCHIVE__PREFERRED") {
            self.archive.preferred = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    /// Reject settings the protocol cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transfer.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                key: "transfer.chunk_size",
                reason: "must be at least 1",
            });
        }
        if self.transfer.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "transfer.poll_interval_ms",
                reason: "must be at least 1",
            });
        }
        if self.transfer.ack_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "transfer.ack_timeout_secs",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}
