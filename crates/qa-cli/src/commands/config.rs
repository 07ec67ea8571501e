//! Config command handlers

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use qa_core::Config;

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str = "log_level, spam_items_per_hour, cheater_min_votes, \
best_answer_window_minutes, high_rated_threshold, very_recent_seconds, recent_items";

fn effective_path(config_path: Option<&PathBuf>) -> PathBuf {
    config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path)
}

fn load(path: &Path) -> Result<Config> {
    Config::load_from_path(path).context("Failed to load configuration")
}

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let path = effective_path(config_path);
    let config = load(&path)?;
    let rules = &config.rules;

    match output.format {
        OutputFormat::Json => output.json(&config)?,
        OutputFormat::Quiet => {
            println!("{}", path.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  log_level:                  {}", config.log_level);
            println!();
            println!("Rules:");
            println!("  spam_items_per_hour:        {}", rules.spam_items_per_hour);
            println!("  cheater_min_votes:          {}", rules.cheater_min_votes);
            println!(
                "  best_answer_window_minutes: {}",
                rules.best_answer_window_minutes
            );
            println!("  high_rated_threshold:       {}", rules.high_rated_threshold);
            println!("  very_recent_seconds:        {}", rules.very_recent_seconds);
            println!("  recent_items:               {}", rules.recent_items);
            println!();
            println!("Config file: {}", path.display());
        }
    }

    Ok(())
}

/// Apply one `key = value` assignment to the configuration
///
/// The configuration is left untouched if the value is rejected.
fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    fn number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
        value
            .parse()
            .ok()
            .with_context(|| format!("Invalid value for {}: '{}'. Expected a number.", key, value))
    }

    let mut updated = config.clone();
    let rules = &mut updated.rules;
    match key {
        "log_level" => {
            if value.is_empty() {
                bail!("log_level must not be empty");
            }
            updated.log_level = value.to_string();
        }
        "spam_items_per_hour" => rules.spam_items_per_hour = number(key, value)?,
        "cheater_min_votes" => rules.cheater_min_votes = number(key, value)?,
        "best_answer_window_minutes" => rules.best_answer_window_minutes = number(key, value)?,
        "high_rated_threshold" => rules.high_rated_threshold = number(key, value)?,
        "very_recent_seconds" => rules.very_recent_seconds = number(key, value)?,
        "recent_items" => rules.recent_items = number(key, value)?,
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }
    updated.rules.validate()?;
    *config = updated;
    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let path = effective_path(config_path);
    let mut config = load(&path)?;
    apply(&mut config, &key, &value)?;

    config
        .save_to_path(&path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::default();
        apply(&mut config, "log_level", "debug").unwrap();
        apply(&mut config, "spam_items_per_hour", "10").unwrap();
        apply(&mut config, "best_answer_window_minutes", "5").unwrap();
        apply(&mut config, "high_rated_threshold", "-2").unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.rules.spam_items_per_hour, 10);
        assert_eq!(config.rules.best_answer_window_minutes, 5);
        assert_eq!(config.rules.high_rated_threshold, -2);
    }

    #[test]
    fn test_apply_rejects_bad_input() {
        let mut config = Config::default();
        assert!(apply(&mut config, "colour", "blue").is_err());
        assert!(apply(&mut config, "recent_items", "many").is_err());
        assert!(apply(&mut config, "spam_items_per_hour", "-1").is_err());
        assert!(apply(&mut config, "log_level", "").is_err());
        assert!(apply(&mut config, "best_answer_window_minutes", "-3").is_err());
        assert!(apply(&mut config, "best_answer_window_minutes", "9223372036854775807").is_err());
        assert!(apply(&mut config, "very_recent_seconds", "9223372036854775807").is_err());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_set_writes_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");
        let output = Output::new(OutputFormat::Quiet);

        set(
            "recent_items".to_string(),
            "7".to_string(),
            Some(&path),
            &output,
        )
        .unwrap();

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("recent_items = 7"));
    }
}
