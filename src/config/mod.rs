//! Configuration and data locations

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.minut.com/v8";
const DEFAULT_REDIRECT_URI: &str = "homewatch://callback";

/// Application settings, read from `config.toml`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// REST API base URL
    pub api_base_url: String,
    /// OAuth base URL (authorize/token); defaults to the API base
    pub oauth_base_url: Option<String>,
    /// OAuth2 client ID
    pub client_id: String,
    /// OAuth2 client secret
    pub client_secret: String,
    /// Redirect URI registered for the client
    pub redirect_uri: String,
    /// Per-request timeout for every network call
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Wall-clock budget for one background sync cycle
    pub sync_budget_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            oauth_base_url: None,
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            request_timeout_secs: 15,
            connect_timeout_secs: 5,
            sync_budget_secs: 25,
        }
    }
}

impl Settings {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "homewatch", "homewatch")
            .context("Could not determine config directory")
    }

    /// Get config file path
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Directory holding the shared credential and cache records
    pub fn default_data_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    /// Load settings from `path`, or from the default location. A missing
    /// file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn oauth_base(&self) -> &str {
        self.oauth_base_url.as_deref().unwrap_or(&self.api_base_url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    pub fn sync_budget(&self) -> Duration {
        Duration::from_secs(self.sync_budget_secs.max(1))
    }
}
