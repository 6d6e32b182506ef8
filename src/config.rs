//! Configuration management for fragsql.
//!
//! Handles loading configuration from TOML files and environment variables,
//! with the environment settings and preloaded SQL fragments.

use crate::error::{FragsqlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable overriding [`EnvironmentConfig::parallelism`].
pub const PARALLELISM_ENV: &str = "FRAGSQL_PARALLELISM";

/// Environment variable overriding [`EnvironmentConfig::use_sql_fragment`].
pub const USE_SQL_FRAGMENT_ENV: &str = "FRAGSQL_USE_SQL_FRAGMENT";

/// Main configuration structure for fragsql.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Environment settings.
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// Fragments registered before the first statement runs.
    #[serde(default)]
    pub fragments: BTreeMap<String, String>,
}

/// Settings of one fragment environment and its engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Whether `name := sql` definitions and `${name}` references are
    /// processed.
    pub use_sql_fragment: bool,

    /// Separator placed between statements when splitting scripts.
    pub statement_separator: String,

    /// Parallelism assigned to translated operators.
    pub parallelism: u32,

    pub default_catalog: String,

    pub default_database: String,

    /// SQL dialect name understood by sqlparser (e.g. "generic", "ansi").
    pub dialect: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            use_sql_fragment: true,
            statement_separator: ";\n".to_string(),
            parallelism: 1,
            default_catalog: "default_catalog".to_string(),
            default_database: "default_database".to_string(),
            dialect: "generic".to_string(),
        }
    }
}

impl EnvironmentConfig {
    /// Applies `FRAGSQL_*` environment variables.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup(PARALLELISM_ENV) {
            self.parallelism = value.trim().parse().map_err(|_| {
                FragsqlError::config(format!("{PARALLELISM_ENV} must be a positive integer, got '{value}'"))
            })?;
        }
        if let Some(value) = lookup(USE_SQL_FRAGMENT_ENV) {
            self.use_sql_fragment = match value.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(FragsqlError::config(format!(
                        "{USE_SQL_FRAGMENT_ENV} must be a boolean, got '{value}'"
                    )))
                }
            };
        }
        Ok(())
    }

    /// Checks values that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            return Err(FragsqlError::config("parallelism must be at least 1"));
        }
        if self.statement_separator.trim().is_empty() {
            return Err(FragsqlError::config("statement_separator must not be blank"));
        }
        Ok(())
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fragsql")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| FragsqlError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            FragsqlError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;
        config.environment.validate()?;
        Ok(config)
    }
}
