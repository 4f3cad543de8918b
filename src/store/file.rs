//! TOML file adapters for the shared stores

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{SharedCache, SharedState, StoreError};
use crate::auth::{Credential, CredentialStore};

pub const CREDENTIALS_FILE: &str = "credentials.toml";
pub const SHARED_FILE: &str = "shared.toml";

static SCRATCH_SEQ: AtomicU64 = AtomicU64::new(0);

/// Credential record kept in a single owner-only TOML file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the fixed location inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(CREDENTIALS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credential>, StoreError> {
        read_record(&self.path)
    }

    fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        write_record(&self.path, credential)?;
        tracing::debug!("Credential written to {}", self.path.display());
        Ok(())
    }

    fn delete(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }
}

/// Shared cache record kept in a TOML file.
#[derive(Debug, Clone)]
pub struct FileSharedState {
    path: PathBuf,
}

impl FileSharedState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(SHARED_FILE))
    }
}

impl SharedState for FileSharedState {
    fn load(&self) -> Result<SharedCache, StoreError> {
        Ok(read_record(&self.path)?.unwrap_or_default())
    }

    fn save(&self, cache: &SharedCache) -> Result<(), StoreError> {
        write_record(&self.path, cache)
    }
}

fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    toml::from_str(&content)
        .map(Some)
        .map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Replace the record at `path` in one step: write a sibling temp file,
/// then rename it over the target. Readers see the old or the new record,
/// never a torn one.
fn write_record<T: Serialize>(path: &Path, record: &T) -> Result<(), StoreError> {
    let content = toml::to_string_pretty(record)?;

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    // Unique per write so two writers never share a scratch file
    let seq = SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_file_name(format!(
        ".{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        seq
    ));

    let mut file = create_private(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
    if let Err(e) = file.write_all(content.as_bytes()).and_then(|_| file.sync_all()) {
        let _ = fs::remove_file(&tmp);
        return Err(StoreError::io(&tmp, e));
    }
    drop(file);

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StoreError::io(path, e)
    })
}

/// Create a new file readable only by the owner. The mode is applied at
/// creation, so the content is never exposed under the process umask.
fn create_private(path: &Path) -> io::Result<fs::File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn credential(access: &str) -> Credential {
        Credential {
            access_token: access.to_string(),
            refresh_token: format!("{}-refresh", access),
            expires_at: Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_missing_credential_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::in_dir(dir.path());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::in_dir(dir.path());

        store.save(&credential("A1")).unwrap();
        store.save(&credential("A2")).unwrap();

        assert_eq!(store.load().unwrap(), Some(credential("A2")));
        // Only the record itself remains, no scratch files
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_two_handles_share_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let interactive = FileCredentialStore::in_dir(dir.path());
        let background = FileCredentialStore::in_dir(dir.path());

        interactive.save(&credential("A1")).unwrap();
        assert_eq!(background.load().unwrap(), Some(credential("A1")));

        background.delete().unwrap();
        assert!(interactive.load().unwrap().is_none());
    }

    #[test]
    fn test_save_leaves_no_scratch_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::in_dir(dir.path());
        store.save(&credential("A1")).unwrap();
        store.save(&credential("A2")).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![CREDENTIALS_FILE.to_string()]);
    }

    #[test]
    fn test_delete_without_record_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::in_dir(dir.path());
        store.delete().unwrap();
        store.delete().unwrap();
    }

    #[test]
    fn test_corrupt_credential_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::in_dir(dir.path());
        fs::write(store.path(), "access_token = ").unwrap();
        assert!(matches!(store.load(), Err(StoreError::Parse { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_credential_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::in_dir(&dir.path().join("nested"));
        store.save(&credential("A1")).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_scratch_file_is_owner_only_before_any_write() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".credentials.toml.tmp");
        let file = create_private(&path).unwrap();

        let mode = file.metadata().unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        // Never reuses an existing file
        assert!(create_private(&path).is_err());
    }

    #[test]
    fn test_shared_state_defaults_then_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let shared = FileSharedState::in_dir(dir.path());
        assert_eq!(shared.load().unwrap(), SharedCache::default());

        let cache = SharedCache {
            resource_id: "home-1".to_string(),
            resource_name: "Cabin".to_string(),
            last_known_armed: true,
            last_update_time: Some(Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap()),
        };
        shared.save(&cache).unwrap();
        assert_eq!(FileSharedState::in_dir(dir.path()).load().unwrap(), cache);
    }

    #[test]
    fn test_shared_state_tolerates_partial_record() {
        let dir = tempfile::tempdir().unwrap();
        let shared = FileSharedState::in_dir(dir.path());
        fs::write(dir.path().join(SHARED_FILE), "resource_id = \"h9\"\n").unwrap();

        let cache = shared.load().unwrap();
        assert_eq!(cache.resource_id, "h9");
        assert!(!cache.last_known_armed);
        assert!(cache.last_update_time.is_none());
    }
}
