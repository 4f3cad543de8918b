//! Token lifecycle shared by the interactive and background processes
//!
//! Each process builds its own [`TokenLifecycle`] over the same
//! [`CredentialStore`]. There is no cross-process lock: every operation is a
//! load, decide, act, save sequence and the last write wins.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::oauth::{ExchangeError, TokenEndpoint, TokenGrant};
use super::tokens::{Credential, CredentialStore};
use super::AuthError;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Token-free view of the stored credential, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSummary {
    Absent,
    Present {
        expires_at: DateTime<Utc>,
        expiring_soon: bool,
        expired: bool,
    },
}

/// Owns the stored credential: hands out valid access tokens, refreshing
/// and persisting as needed.
#[derive(Clone)]
pub struct TokenLifecycle {
    store: Arc<dyn CredentialStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    clock: Arc<dyn Clock>,
}

impl TokenLifecycle {
    pub fn new(store: Arc<dyn CredentialStore>, endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self {
            store,
            endpoint,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Return an access token that stays valid for at least the refresh
    /// lookahead.
    ///
    /// Makes no network call while the stored credential is not expiring
    /// soon. Otherwise performs exactly one refresh exchange.
    pub async fn get_valid_access_token(&self) -> Result<String, AuthError> {
        let credential = self.store.load()?.ok_or(AuthError::MissingCredentials)?;

        if !credential.is_expiring_soon(self.now()) {
            return Ok(credential.access_token);
        }

        tracing::info!(
            "Access token expires at {}, refreshing...",
            credential.expires_at
        );
        self.refresh(credential).await
    }

    /// Refresh unconditionally, e.g. after the API answered 401 for a token
    /// that looked valid locally.
    pub async fn force_refresh(&self) -> Result<String, AuthError> {
        let credential = self.store.load()?.ok_or(AuthError::MissingCredentials)?;
        tracing::info!("Forcing token refresh");
        self.refresh(credential).await
    }

    async fn refresh(&self, current: Credential) -> Result<String, AuthError> {
        let grant = TokenGrant::RefreshToken(current.refresh_token.clone());

        let response = match self.endpoint.exchange(grant).await {
            Ok(response) => response,
            Err(source) => return Err(self.refresh_failed(&current, source)),
        };

        let refreshed = Credential::issued_at(
            response.access_token,
            response
                .refresh_token
                .unwrap_or_else(|| current.refresh_token.clone()),
            response.expires_in,
            self.now(),
        );
        self.store.save(&refreshed)?;

        tracing::info!(
            "Token refreshed, new expiry {}",
            refreshed.expires_at
        );
        Ok(refreshed.access_token)
    }

    /// Apply the single corrective side effect for a failed refresh: a
    /// rejected refresh token is deleted, anything else leaves the record
    /// untouched for the next attempt.
    fn refresh_failed(&self, used: &Credential, source: ExchangeError) -> AuthError {
        if !source.is_rejection() {
            tracing::warn!("Token refresh failed, keeping credential: {}", source);
            return AuthError::RefreshFailed {
                source,
                credential_revoked: false,
            };
        }

        // Another process may have refreshed since we loaded; only delete
        // the record our rejected refresh token came from.
        let credential_revoked = match self.store.load() {
            Ok(Some(stored)) if stored.refresh_token != used.refresh_token => {
                tracing::info!("Credential was replaced concurrently, not deleting");
                false
            }
            Ok(_) => {
                if let Err(e) = self.store.delete() {
                    tracing::warn!("Failed to delete rejected credential: {}", e);
                }
                true
            }
            Err(e) => {
                tracing::warn!("Could not reload credential before delete: {}", e);
                if let Err(e) = self.store.delete() {
                    tracing::warn!("Failed to delete rejected credential: {}", e);
                }
                true
            }
        };

        if credential_revoked {
            tracing::warn!("Refresh token rejected ({}); credential deleted", source);
        }
        AuthError::RefreshFailed {
            source,
            credential_revoked,
        }
    }

    /// Exchange an authorization code from the interactive sign-in flow and
    /// store the resulting credential, replacing any previous one.
    pub async fn exchange_authorization_code(&self, code: &str) -> Result<Credential, AuthError> {
        let response = self
            .endpoint
            .exchange(TokenGrant::AuthorizationCode(code.to_string()))
            .await
            .map_err(AuthError::TokenExchangeFailed)?;

        let refresh_token = response.refresh_token.ok_or_else(|| {
            AuthError::TokenExchangeFailed(ExchangeError::Malformed(
                "token response has no refresh_token".to_string(),
            ))
        })?;

        let credential = Credential::issued_at(
            response.access_token,
            refresh_token,
            response.expires_in,
            self.now(),
        );
        self.store.save(&credential)?;

        tracing::info!("Signed in, token expires at {}", credential.expires_at);
        Ok(credential)
    }

    pub fn has_credential(&self) -> Result<bool, AuthError> {
        Ok(self.store.load()?.is_some())
    }

    pub fn credential_summary(&self) -> Result<CredentialSummary, AuthError> {
        let now = self.now();
        Ok(match self.store.load()? {
            Some(c) => CredentialSummary::Present {
                expires_at: c.expires_at,
                expiring_soon: c.is_expiring_soon(now),
                expired: c.is_expired(now),
            },
            None => CredentialSummary::Absent,
        })
    }

    /// Delete the stored credential.
    pub fn sign_out(&self) -> Result<(), AuthError> {
        self.store.delete()?;
        tracing::info!("Credential deleted");
        Ok(())
    }
}
