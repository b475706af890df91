//! Configuration for optiforge
//!
//! Stores settings in ~/.config/optiforge/config.json. The API key can also
//! be supplied via the OPENROUTER_API_KEY environment variable, which takes
//! precedence over the file. All values are static for the duration of a
//! run; nothing mutates them mid-loop.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub openrouter_api_key: Option<String>,
    /// Model identifier sent to the provider.
    #[serde(default = "default_model")]
    pub model: String,
    /// Attempt budget for the generate/repair loop.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Hard wall-clock timeout for one sandboxed execution.
    #[serde(default = "default_exec_timeout_secs")]
    pub exec_timeout_secs: u64,
    /// Sampling temperature for generation requests.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_model() -> String {
    crate::llm::DEFAULT_MODEL.to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_exec_timeout_secs() -> u64 {
    crate::sandbox::DEFAULT_TIMEOUT.as_secs()
}

fn default_temperature() -> f32 {
    1.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openrouter_api_key: None,
            model: default_model(),
            max_attempts: default_max_attempts(),
            exec_timeout_secs: default_exec_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

impl Config {
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("optiforge"))
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return defaults. A corrupt file is backed
    /// up and replaced by defaults rather than aborting the run.
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if let Ok(content) = fs::read_to_string(&path) {
                match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(err) => {
                        preserve_corrupt_config(&path, &content);
                        eprintln!(
                            "  Warning: Config file was corrupted ({}). A backup was saved and defaults were loaded.",
                            err
                        );
                    }
                }
            }
        }
        Self::default()
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir().context("could not determine config directory")?;
        self.save_to(&dir)
    }

    fn save_to(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory '{}'", dir.display()))?;
        let path = dir.join("config.json");
        let content = serde_json::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(&path, content)
            .with_context(|| format!("failed to write config '{}'", path.display()))
    }

    /// Effective API key: environment first, then the config file.
    pub fn api_key(&self) -> Option<String> {
        resolve_api_key(
            std::env::var("OPENROUTER_API_KEY").ok(),
            self.openrouter_api_key.as_deref(),
        )
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_attempts >= 1, "max attempts must be at least 1");
        ensure!(self.exec_timeout_secs > 0, "execution timeout must be positive");
        ensure!(
            (0.0..=2.0).contains(&self.temperature),
            "temperature must be between 0.0 and 2.0"
        );
        ensure!(!self.model.trim().is_empty(), "model must not be empty");
        Ok(())
    }
}

fn resolve_api_key(env_key: Option<String>, stored: Option<&str>) -> Option<String> {
    env_key
        .filter(|key| !key.trim().is_empty())
        .or_else(|| stored.map(str::to_string).filter(|key| !key.trim().is_empty()))
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let backup = path.with_extension("json.corrupt");
    let _ = fs::write(backup, content);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.exec_timeout_secs, 120);
        assert_eq!(config.temperature, 1.0);
    }

    #[test]
    fn zero_attempts_rejected() {
        let config = Config {
            max_attempts: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_temperature_rejected() {
        let config = Config {
            temperature: 2.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = Config {
            exec_timeout_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_key_wins_over_stored() {
        let key = resolve_api_key(Some("env-key".into()), Some("stored-key"));
        assert_eq!(key.as_deref(), Some("env-key"));
    }

    #[test]
    fn stored_key_used_when_env_missing_or_blank() {
        assert_eq!(
            resolve_api_key(None, Some("stored-key")).as_deref(),
            Some("stored-key")
        );
        assert_eq!(
            resolve_api_key(Some("  ".into()), Some("stored-key")).as_deref(),
            Some("stored-key")
        );
    }

    #[test]
    fn blank_everything_is_none() {
        assert_eq!(resolve_api_key(None, None), None);
        assert_eq!(resolve_api_key(Some(String::new()), Some(" ")), None);
    }

    #[test]
    fn save_round_trips_through_the_loader_format() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            openrouter_api_key: Some("stored-key".into()),
            max_attempts: 5,
            ..Config::default()
        };
        config.save_to(dir.path()).unwrap();

        let content = fs::read_to_string(dir.path().join("config.json")).unwrap();
        let loaded: Config = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.openrouter_api_key.as_deref(), Some("stored-key"));
        assert_eq!(loaded.max_attempts, 5);
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn default_timeout_tracks_the_executor() {
        assert_eq!(
            default_exec_timeout_secs(),
            crate::sandbox::DEFAULT_TIMEOUT.as_secs()
        );
    }

    #[test]
    fn partial_config_files_get_defaults() {
        let config: Config = serde_json::from_str(r#"{"openrouter_api_key":"k"}"#).unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.model, crate::llm::DEFAULT_MODEL);
    }
}
