//! Configuration management for streamsql

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use streamhouse_sql_client::FetcherConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// StreamHouse REST API address
    pub api_url: String,

    /// Default output format
    pub output_format: OutputFormat,

    /// Enable colored output
    pub colored: bool,

    /// Start auto-refresh after each statement in the shell
    pub auto_refresh: bool,

    /// Result cache and paging settings
    pub results: FetcherConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
    Csv,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            output_format: OutputFormat::Table,
            colored: true,
            auto_refresh: false,
            results: FetcherConfig::default(),
        }
    }
}

impl Config {
    /// Load config from `path`, or the default location, falling back to
    /// defaults when the file does not exist
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path(),
        };

        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get config file path (~/.streamhouse/sql.toml)
    pub fn config_path() -> PathBuf {
        streamhouse_dir().join("sql.toml")
    }
}

/// `~/.streamhouse`, or `./.streamhouse` without a home directory
pub fn streamhouse_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".streamhouse")
}
