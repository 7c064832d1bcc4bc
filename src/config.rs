//! Configuration types for the presence tracker.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    /// Background polling cadence.
    pub poller: PollerConfig,
    /// Per-operation-class upstream call budgets.
    pub rate_limits: RateLimitConfig,
    /// Snapshot persistence settings.
    pub snapshot: SnapshotConfig,
    /// Bot identity settings.
    pub bot: BotConfig,
}

/// Polling loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Seconds between full directory/presence refreshes.
    pub refresh_secs: u64,
    /// Loop tick in seconds. The tick only bounds how quickly the loop
    /// notices that a refresh is due (or that a stop was requested); refresh
    /// cadence is tracked separately so it drifts by at most one tick.
    pub tick_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            refresh_secs: 120,
            tick_secs: 1,
        }
    }
}

/// Upstream call budgets, one rolling-window limit per operation class.
///
/// Each class is independent: exhausting the presence budget never delays a
/// group listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Group listing calls per minute.
    pub groups_per_minute: u32,
    /// User listing calls per minute.
    pub users_per_minute: u32,
    /// Presence lookup calls per minute.
    pub presence_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            groups_per_minute: 20,
            users_per_minute: 20,
            presence_per_minute: 50,
        }
    }
}

/// Snapshot persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Where the gzip-compressed activity snapshot lives.
    pub path: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_data_dir().join("activity.json.gz"),
        }
    }
}

/// Bot identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Display name the bot publishes upstream. Used to recognize (and skip)
    /// the bot's own account in user listings.
    pub name: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "ActiveUsers".to_owned(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".vigil")
    } else {
        PathBuf::from("/tmp").join(".vigil")
    }
}

impl VigilConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::VigilError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::VigilError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/vigil/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("vigil").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("vigil")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/vigil-config.toml")
        }
    }
}
