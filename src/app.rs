//! Service wiring for one process
//!
//! Every command builds its services here from explicit settings and a data
//! directory; nothing is looked up from global state.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::ResourceClient;
use crate::auth::{AuthConfig, OAuthTokenEndpoint, TokenLifecycle};
use crate::config::Settings;
use crate::store::{FileCredentialStore, FileSharedState};
use crate::sync::StatusSync;

pub struct App {
    pub settings: Settings,
    data_dir: PathBuf,
}

impl App {
    pub fn new(settings: Settings, data_dir: PathBuf) -> Self {
        Self { settings, data_dir }
    }

    /// Load settings and resolve the data directory, honouring overrides.
    pub fn load(config: Option<&Path>, data_dir: Option<PathBuf>) -> Result<Self> {
        let settings = Settings::load(config)?;
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => Settings::default_data_dir()?,
        };
        tracing::debug!("Data directory: {}", data_dir.display());
        Ok(Self::new(settings, data_dir))
    }

    pub fn shared_state(&self) -> Arc<FileSharedState> {
        Arc::new(FileSharedState::in_dir(&self.data_dir))
    }

    pub fn token_endpoint(&self) -> Result<Arc<OAuthTokenEndpoint>> {
        let endpoint = OAuthTokenEndpoint::new(&AuthConfig::from_settings(&self.settings))?;
        Ok(Arc::new(endpoint))
    }

    pub fn lifecycle_with(&self, endpoint: Arc<OAuthTokenEndpoint>) -> TokenLifecycle {
        TokenLifecycle::new(
            Arc::new(FileCredentialStore::in_dir(&self.data_dir)),
            endpoint,
        )
    }

    pub fn lifecycle(&self) -> Result<TokenLifecycle> {
        Ok(self.lifecycle_with(self.token_endpoint()?))
    }

    pub fn status_sync(&self) -> Result<StatusSync> {
        let client = ResourceClient::new(
            &self.settings.api_base_url,
            self.settings.request_timeout(),
            self.settings.connect_timeout(),
        )
        .context("Failed to build API client")?;

        Ok(StatusSync::new(self.lifecycle()?, client, self.shared_state()))
    }
}
