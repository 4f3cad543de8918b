//! Status sync: the unit of work both processes run
//!
//! Combines the token lifecycle, the resource client and the shared cache.
//! This is where degradation happens: a failed live fetch falls back to the
//! cached status instead of surfacing the error.

mod view;

pub use view::StatusView;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::api::{ApiError, ResourceClient};
use crate::auth::{AuthError, TokenLifecycle};
use crate::models::Home;
use crate::store::{SharedCache, SharedState, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("shared state: {0}")]
    Store(#[from] StoreError),
    #[error("no home selected")]
    NoResourceSelected,
    #[error("home {0} not found")]
    UnknownResource(String),
}

impl SyncError {
    pub fn requires_sign_in(&self) -> bool {
        matches!(self, Self::Auth(e) if e.requires_sign_in())
    }
}

pub struct StatusSync {
    lifecycle: TokenLifecycle,
    client: ResourceClient,
    shared: Arc<dyn SharedState>,
}

impl StatusSync {
    pub fn new(
        lifecycle: TokenLifecycle,
        client: ResourceClient,
        shared: Arc<dyn SharedState>,
    ) -> Self {
        Self {
            lifecycle,
            client,
            shared,
        }
    }

    pub fn lifecycle(&self) -> &TokenLifecycle {
        &self.lifecycle
    }

    pub fn cached(&self) -> Result<SharedCache, StoreError> {
        self.shared.load()
    }

    /// Run `call` with a valid token. If the API still answers 401, force
    /// one refresh and retry once.
    async fn authorized<T, F, Fut>(&self, call: F) -> Result<T, SyncError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let token = self.lifecycle.get_valid_access_token().await?;
        match call(token).await {
            Err(ApiError::Unauthorized) => {
                tracing::warn!("API rejected access token, refreshing and retrying once");
                let token = self.lifecycle.force_refresh().await?;
                Ok(call(token).await?)
            }
            other => Ok(other?),
        }
    }

    /// Fetch the selected home's status and cache it, falling back to the
    /// cached value when the live fetch fails.
    pub async fn fetch_status(&self) -> StatusView {
        let cache = match self.shared.load() {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!("Shared state unreadable, treating as empty: {}", e);
                SharedCache::default()
            }
        };

        if !cache.has_selection() {
            return StatusView::NoResourceSelected;
        }

        let client = &self.client;
        let home_id = cache.resource_id.as_str();
        let result = self
            .authorized(move |token| async move { client.get_status(home_id, &token).await })
            .await;

        match result {
            Ok(status) => {
                self.record(&cache, status.is_armed());
                tracing::info!(home_id, status = %status, "Status updated");
                StatusView::Ready {
                    home_name: cache.resource_name.clone(),
                    status,
                }
            }
            Err(e) if e.requires_sign_in() => {
                tracing::info!("Status unavailable: {}", e);
                StatusView::NotAuthenticated
            }
            Err(e) => {
                tracing::warn!(home_id, "Status fetch failed, using cache: {}", e);
                StatusView::from_cache(&cache, e.to_string())
            }
        }
    }

    /// Background entry point: one `fetch_status` bounded by `budget`.
    pub async fn run_background_cycle(&self, budget: Duration) -> StatusView {
        match tokio::time::timeout(budget, self.fetch_status()).await {
            Ok(view) => view,
            Err(_) => {
                tracing::warn!("Sync budget of {:?} exhausted", budget);
                let cache = self.shared.load().unwrap_or_default();
                StatusView::from_cache(&cache, "sync budget exhausted")
            }
        }
    }

    /// Arm or disarm the selected home. Failures are reported, never
    /// papered over with cached state.
    pub async fn set_armed(&self, armed: bool) -> Result<(), SyncError> {
        let cache = self.shared.load()?;
        if !cache.has_selection() {
            return Err(SyncError::NoResourceSelected);
        }

        let client = &self.client;
        let home_id = cache.resource_id.as_str();
        self.authorized(move |token| async move { client.set_status(home_id, armed, &token).await })
            .await?;

        tracing::info!(home_id, armed, "Alarm status set");
        self.record(&cache, armed);
        Ok(())
    }

    pub async fn list_resources(&self) -> Result<Vec<Home>, SyncError> {
        let client = &self.client;
        self.authorized(move |token| async move { client.list_resources(&token).await })
            .await
    }

    /// Select the home with `home_id` from the account's list.
    pub async fn select_by_id(&self, home_id: &str) -> Result<Home, SyncError> {
        let home = self
            .list_resources()
            .await?
            .into_iter()
            .find(|h| h.home_id == home_id)
            .ok_or_else(|| SyncError::UnknownResource(home_id.to_string()))?;
        self.select_resource(&home)?;
        Ok(home)
    }

    /// Replace the selection. The cached status only survives when the same
    /// home is selected again.
    pub fn select_resource(&self, home: &Home) -> Result<(), SyncError> {
        let current = self.shared.load()?;
        let next = if current.resource_id == home.home_id {
            SharedCache {
                resource_name: home.name.clone(),
                ..current
            }
        } else {
            SharedCache {
                resource_id: home.home_id.clone(),
                resource_name: home.name.clone(),
                ..SharedCache::default()
            }
        };
        self.shared.save(&next)?;
        tracing::info!(home_id = %home.home_id, "Home selected");
        Ok(())
    }

    /// Write the whole cache record with a fresh armed flag.
    fn record(&self, cache: &SharedCache, armed: bool) {
        let next = SharedCache {
            last_known_armed: armed,
            last_update_time: Some(self.lifecycle.now()),
            ..cache.clone()
        };
        if let Err(e) = self.shared.save(&next) {
            tracing::warn!("Failed to cache status: {}", e);
        }
    }
}
