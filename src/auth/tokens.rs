//! Credential model and storage contract

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::store::StoreError;

/// Lookahead before `expires_at` at which a credential counts as expiring.
pub const REFRESH_LOOKAHEAD_SECS: i64 = 300;

// Clamp absurd server-reported lifetimes so the addition cannot overflow
const MAX_EXPIRES_IN_SECS: u64 = 10 * 365 * 24 * 3600;

/// Stored OAuth2 session: one access/refresh pair with an absolute expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Build a credential from a token-endpoint lifetime, measured from `now`.
    pub fn issued_at(
        access_token: String,
        refresh_token: String,
        expires_in_secs: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let secs = expires_in_secs.min(MAX_EXPIRES_IN_SECS) as i64;
        Self {
            access_token,
            refresh_token,
            expires_at: now + Duration::seconds(secs),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Consider expiring if less than 5 minutes remain
    pub fn is_expiring_soon(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_LOOKAHEAD_SECS) >= self.expires_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Durable single-record credential storage shared by every process.
///
/// `save` replaces the record wholesale; `delete` of an absent record is
/// not an error.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<Credential>, StoreError>;
    fn save(&self, credential: &Credential) -> Result<(), StoreError>;
    fn delete(&self) -> Result<(), StoreError>;
}
