//! In-memory store adapters
//!
//! Clones share the same record, which is how tests model two workers
//! opening one store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{SharedCache, SharedState, StoreError};
use crate::auth::{Credential, CredentialStore};

#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    record: Arc<Mutex<Option<Credential>>>,
}

impl MemoryCredentialStore {
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            record: Arc::new(Mutex::new(Some(credential))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Credential>> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credential>, StoreError> {
        Ok(self.lock().clone())
    }

    fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        *self.lock() = Some(credential.clone());
        Ok(())
    }

    fn delete(&self) -> Result<(), StoreError> {
        *self.lock() = None;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySharedState {
    record: Arc<Mutex<SharedCache>>,
}

impl MemorySharedState {
    pub fn with_cache(cache: SharedCache) -> Self {
        Self {
            record: Arc::new(Mutex::new(cache)),
        }
    }
}

impl SharedState for MemorySharedState {
    fn load(&self) -> Result<SharedCache, StoreError> {
        Ok(self
            .record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, cache: &SharedCache) -> Result<(), StoreError> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = cache.clone();
        Ok(())
    }
}
