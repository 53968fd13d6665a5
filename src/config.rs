//! Layered configuration.
//!
//! Sources, highest priority first:
//! 1. Environment variables with the `REVISOR_` prefix (`REVISOR_DATABASE`,
//!    `REVISOR_LOG_LEVEL`, `REVISOR_HISTORY_LIMIT`)
//! 2. `<config dir>/revisor/config.toml`
//! 3. Built-in defaults

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

const DEFAULT_DB_NAME: &str = "revisor.db";
const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

fn default_log_level() -> String {
    "warn".to_string()
}

const fn default_history_limit() -> usize {
    50
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// SQLite file holding sessions and overrides.
    #[serde(default)]
    pub database: Option<PathBuf>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Rows shown by `history` when no limit is given.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            log_level: default_log_level(),
            history_limit: default_history_limit(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let config: Config = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = Self::config_file_path() {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        figment.merge(Env::prefixed("REVISOR_"))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "log_level".to_string(),
                reason: format!("expected one of {}", LOG_LEVELS.join(", ")),
            });
        }
        if self.history_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "history_limit".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("revisor")
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("revisor").join("config.toml"))
    }

    pub fn db_path(&self) -> PathBuf {
        if let Some(path) = &self.database {
            return path.clone();
        }

        let config_dir = Self::config_dir();
        std::fs::create_dir_all(&config_dir).ok();
        config_dir.join(DEFAULT_DB_NAME)
    }
}
