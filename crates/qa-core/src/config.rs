//! Store configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/qa/config.toml)
//! 3. Environment variables (QA_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{bail, Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix
const ENV_PREFIX: &str = "QA";

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Default tracing filter when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Business rule thresholds
    #[serde(default)]
    pub rules: Rules,
}

/// Thresholds used by the content and moderation rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    /// Posts and votes per hour at which a user counts as a spammer
    pub spam_items_per_hour: usize,
    /// Up votes for one owner must exceed this to look like cheating
    pub cheater_min_votes: usize,
    /// Minutes before a chosen best answer may be replaced
    pub best_answer_window_minutes: i64,
    /// Rating at which an answer counts as high-rated
    pub high_rated_threshold: i64,
    /// Age in seconds below which a notification is "very recent"
    pub very_recent_seconds: i64,
    /// Length of the per-user "recent" lists
    pub recent_items: usize,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            spam_items_per_hour: 60,
            cheater_min_votes: 3,
            best_answer_window_minutes: 30,
            high_rated_threshold: 5,
            very_recent_seconds: 300,
            recent_items: 3,
        }
    }
}

impl Rules {
    /// Negative values count as zero, values beyond the range of `Duration` as `Duration::MAX`
    pub fn best_answer_window(&self) -> Duration {
        Duration::try_minutes(self.best_answer_window_minutes.max(0)).unwrap_or(Duration::MAX)
    }

    /// Clamped like [`Rules::best_answer_window`]
    pub fn very_recent_window(&self) -> Duration {
        Duration::try_seconds(self.very_recent_seconds.max(0)).unwrap_or(Duration::MAX)
    }

    /// Reject time windows that are negative or too large to represent
    pub fn validate(&self) -> Result<()> {
        check_window(
            "best_answer_window_minutes",
            self.best_answer_window_minutes,
            Duration::try_minutes,
        )?;
        check_window(
            "very_recent_seconds",
            self.very_recent_seconds,
            Duration::try_seconds,
        )?;
        Ok(())
    }
}

fn check_window(key: &str, value: i64, to_duration: fn(i64) -> Option<Duration>) -> Result<()> {
    if value < 0 {
        bail!("Invalid value for {}: {} must not be negative", key, value);
    }
    if to_duration(value).is_none() {
        bail!("Invalid value for {}: {} is out of range", key, value);
    }
    Ok(())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            rules: Rules::default(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (QA_LOG_LEVEL, QA_SPAM_ITEMS_PER_HOUR, QA_BEST_ANSWER_WINDOW_MINUTES)
    /// 2. Config file (~/.config/qa/config.toml or QA_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config
            .rules
            .validate()
            .with_context(|| format!("Invalid rules in config file: {:?}", path))?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        config.rules.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        // QA_LOG_LEVEL
        if let Ok(val) = std::env::var(format!("{}_LOG_LEVEL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.log_level = val;
            }
        }

        // QA_SPAM_ITEMS_PER_HOUR
        if let Some(val) = env_number(&format!("{}_SPAM_ITEMS_PER_HOUR", ENV_PREFIX))? {
            self.rules.spam_items_per_hour = val;
        }

        // QA_BEST_ANSWER_WINDOW_MINUTES
        if let Some(val) = env_number(&format!("{}_BEST_ANSWER_WINDOW_MINUTES", ENV_PREFIX))? {
            self.rules.best_answer_window_minutes = val;
        }
        Ok(())
    }

    /// Save configuration to a file, creating its directory if needed
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Get the config file path
    ///
    /// Can be overridden with QA_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("qa")
            .join("config.toml")
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Read a numeric environment variable; unset or empty means "no override"
fn env_number<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(val) if !val.trim().is_empty() => {
            let parsed = val
                .trim()
                .parse()
                .with_context(|| format!("Invalid value for {}: {:?}", name, val))?;
            Ok(Some(parsed))
        }
        _ => Ok(None),
    }
}
