//! TOML configuration with environment and CLI overrides.
//!
//! Precedence, lowest to highest: built-in defaults, the config file at the
//! platform config dir, `SHOPBOT_BASE_URL` / `SHOPBOT_API_KEY`, then the
//! `--base-url` flag.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8787";
pub const DEFAULT_GREETING: &str =
    "Hi! I'm ShopBot, your shopping assistant. Ask me about phones, laptops, or headphones \
     and I'll compare prices across stores.";

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read config at {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "Failed to parse config at {}: {}", path.display(), source)
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Base URL of the chat relay.
    pub base_url: Option<String>,
    /// Bearer token sent with chat requests, if the relay wants one.
    pub api_key: Option<String>,
    /// Assistant greeting shown at the top of a fresh conversation.
    pub greeting: Option<String>,
}

impl Config {
    pub fn load() -> Result<Config, Box<dyn std::error::Error>> {
        Self::load_from_path(&Self::config_path())
    }

    pub fn load_from_path(config_path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
                path: config_path.to_path_buf(),
                source,
            })?;
            let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: config_path.to_path_buf(),
                source,
            })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let parent = config_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty());

        if let Some(dir) = parent {
            fs::create_dir_all(dir)?;
        }

        let contents = toml::to_string_pretty(self)?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };

        temp_file.write_all(contents.as_bytes())?;
        temp_file.as_file_mut().sync_all()?;
        temp_file
            .persist(config_path)
            .map_err(|err| -> Box<dyn std::error::Error> { Box::new(err) })?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        let proj_dirs = ProjectDirs::from("org", "permacommons", "shopbot")
            .expect("Failed to determine config directory");
        proj_dirs.config_dir().join("config.toml")
    }

    /// Applies environment and CLI overrides and fills in defaults.
    pub fn resolve(mut self, cli_base_url: Option<String>) -> ResolvedConfig {
        if let Ok(url) = std::env::var("SHOPBOT_BASE_URL") {
            if !url.is_empty() {
                self.base_url = Some(url);
            }
        }
        if let Ok(key) = std::env::var("SHOPBOT_API_KEY") {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Some(url) = cli_base_url {
            self.base_url = Some(url);
        }

        ResolvedConfig {
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: self.api_key.unwrap_or_default(),
            greeting: self
                .greeting
                .unwrap_or_else(|| DEFAULT_GREETING.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub api_key: String,
    pub greeting: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(&dir.path().join("config.toml")).unwrap();
        assert!(config.base_url.is_none());
        assert!(config.api_key.is_none());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            base_url: Some("https://relay.example.com".to_string()),
            api_key: Some("secret".to_string()),
            greeting: None,
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.base_url.as_deref(), Some("https://relay.example.com"));
        assert_eq!(loaded.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn invalid_toml_reports_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "base_url = [not toml").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn cli_flag_beats_file_value() {
        let config = Config {
            base_url: Some("https://from-file.example.com".to_string()),
            api_key: None,
            greeting: None,
        };
        let resolved = config.resolve(Some("https://from-cli.example.com".to_string()));
        assert_eq!(resolved.base_url, "https://from-cli.example.com");
        assert_eq!(resolved.api_key, "");
        assert_eq!(resolved.greeting, DEFAULT_GREETING);
    }
}
