//! Configuration Management
//!
//! Optional YAML file in the user config directory. Every setting resolves
//! as CLI flag > environment > file > built-in default.

use crate::apigw::ApiGatewayClient;
use crate::driver::DEFAULT_MAX_RESCHEDULES;
use crate::retry::DEFAULT_SAFETY_MARGIN;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "apigw-provisioner";
const DEFAULT_REGION: &str = "us-east-1";

pub const REGION_ENV: &str = "AWS_REGION";
pub const TOKEN_ENV: &str = "APIGW_API_TOKEN";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// API Gateway management endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// Where the file tracker keeps its entries
    #[serde(default)]
    pub tracker_path: Option<PathBuf>,
    #[serde(default)]
    pub safety_margin_secs: Option<u64>,
    #[serde(default)]
    pub max_reschedules: Option<u32>,
    /// Bearer token sent with every API call
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join("config.yaml"))
    }

    /// Load configuration from disk, defaulting when absent or unreadable
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Ignoring config {:?}: {:#}", path, err);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Get effective region (CLI > AWS_REGION > config > us-east-1)
    pub fn effective_region(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| env_var(REGION_ENV))
            .or_else(|| self.region.clone())
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    /// Get effective endpoint (CLI > config > regional endpoint)
    pub fn effective_endpoint(&self, cli: Option<&str>, region: &str) -> String {
        cli.map(str::to_string)
            .or_else(|| self.endpoint.clone())
            .unwrap_or_else(|| ApiGatewayClient::regional_endpoint(region))
    }

    /// Get effective tracker file (CLI > config > data dir)
    pub fn effective_tracker_path(&self, cli: Option<&Path>) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or_else(|| self.tracker_path.clone())
            .unwrap_or_else(default_tracker_path)
    }

    /// Get effective bearer token (APIGW_API_TOKEN > config)
    pub fn effective_api_token(&self) -> Option<String> {
        env_var(TOKEN_ENV).or_else(|| self.api_token.clone())
    }

    pub fn safety_margin(&self) -> Duration {
        self.safety_margin_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SAFETY_MARGIN)
    }

    pub fn max_reschedules(&self) -> u32 {
        self.max_reschedules.unwrap_or(DEFAULT_MAX_RESCHEDULES)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn default_tracker_path() -> PathBuf {
    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join(APP_DIR).join("tracker.json");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(format!(".{}", APP_DIR)).join("tracker.json");
    }
    PathBuf::from("tracker.json")
}
