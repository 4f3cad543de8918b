//! Process-shared storage
//!
//! Two capability interfaces back the whole system: the single-record
//! credential store (see [`crate::auth::CredentialStore`]) and the
//! non-secret [`SharedState`] cache. Both processes open the same files and
//! every write replaces a whole record, so the last writer wins.

mod file;
mod memory;

pub use file::{FileCredentialStore, FileSharedState};
pub use memory::{MemoryCredentialStore, MemorySharedState};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Non-secret state shared between the interactive and background processes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedCache {
    /// Selected home id; empty means nothing is selected
    pub resource_id: String,
    /// Display name of the selected home
    pub resource_name: String,
    /// Armed flag from the most recent successful fetch or mutation
    pub last_known_armed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
}

impl SharedCache {
    pub fn has_selection(&self) -> bool {
        !self.resource_id.is_empty()
    }
}

/// Shared key-value store for [`SharedCache`].
///
/// `load` returns the default (empty) record when nothing has been written.
pub trait SharedState: Send + Sync {
    fn load(&self) -> Result<SharedCache, StoreError>;
    fn save(&self, cache: &SharedCache) -> Result<(), StoreError>;
}
