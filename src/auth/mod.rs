//! Authentication module
//!
//! Implements the OAuth2 authorization-code flow against the provider and
//! the token lifecycle shared by the interactive and background processes.

pub mod lifecycle;
pub mod oauth;
pub mod signin;
pub mod tokens;

pub use lifecycle::{Clock, CredentialSummary, SystemClock, TokenLifecycle};
pub use oauth::{
    parse_callback, ExchangeError, OAuthTokenEndpoint, TokenEndpoint, TokenGrant,
    TokenGrantResponse,
};
pub use tokens::{Credential, CredentialStore};

use std::time::Duration;

use crate::config::Settings;
use crate::store::StoreError;

/// OAuth2 client configuration for the provider
#[derive(Clone)]
pub struct AuthConfig {
    /// OAuth2 client ID
    pub client_id: String,
    /// OAuth2 client secret (sent in the token request body)
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    /// Callback URI registered with the provider
    pub redirect_uri: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl AuthConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let base = settings.oauth_base().trim_end_matches('/');
        Self {
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            authorize_url: format!("{}/oauth/authorize", base),
            token_url: format!("{}/oauth/token", base),
            redirect_uri: settings.redirect_uri.clone(),
            request_timeout: settings.request_timeout(),
            connect_timeout: settings.connect_timeout(),
        }
    }
}

/// Credential lifecycle failure
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("not signed in; run 'homewatch login'")]
    MissingCredentials,
    #[error("OAuth client is not configured: {0}")]
    InvalidConfiguration(String),
    #[error("authorization failed: {0}")]
    AuthorizationFailed(String),
    #[error("authorization code exchange failed: {0}")]
    TokenExchangeFailed(#[source] ExchangeError),
    /// `credential_revoked` is set when the stored credential was deleted
    #[error("token refresh failed: {source}")]
    RefreshFailed {
        #[source]
        source: ExchangeError,
        credential_revoked: bool,
    },
    #[error("credential store: {0}")]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Whether the user has to sign in again before anything can succeed.
    pub fn requires_sign_in(&self) -> bool {
        matches!(
            self,
            Self::MissingCredentials
                | Self::AuthorizationFailed(_)
                | Self::RefreshFailed {
                    credential_revoked: true,
                    ..
                }
        )
    }

    /// Whether retrying later, without user action, may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RefreshFailed {
                credential_revoked, ..
            } => !credential_revoked,
            Self::TokenExchangeFailed(e) => !e.is_rejection(),
            _ => false,
        }
    }
}
