use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use seqcast_core::PredictorConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// `<config_dir>/seqcast`, e.g. `~/.config/seqcast` on Linux.
pub fn seqcast_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push("seqcast");
        path
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub predictor: PredictorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allow any origin, method and header
    #[serde(default = "default_cors")]
    pub cors: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    5959
}
fn default_cors() -> bool {
    true
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors: default_cors(),
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        seqcast_config_dir().map(|mut path| {
            path.push("config.toml");
            path
        })
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content).context("invalid config TOML")?;
        config
            .predictor
            .validate()
            .context("invalid [predictor] section")?;
        Ok(config)
    }

    /// Load from `path` when given (it must exist), otherwise from the default
    /// location, falling back to built-in defaults when that file is absent.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => path,
                None => {
                    warn!("no config file found, using defaults");
                    return Ok(Config::default());
                }
            },
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }
}
