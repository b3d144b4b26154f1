use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Durable key/value slots for client-side session state.
///
/// Implementations must be safe to share, but the only writer is the
/// [`SessionStore`](crate::SessionStore).
pub trait CredentialStorage: Send + Sync + fmt::Debug {
    fn load(&self, slot: &str) -> Result<Option<String>, StorageError>;
    fn save(&self, slot: &str, value: &str) -> Result<(), StorageError>;
    /// Removing a slot that does not exist is not an error.
    fn remove(&self, slot: &str) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to remove {}: {source}", path.display())]
    Remove { path: PathBuf, source: io::Error },

    #[error("invalid storage slot name: {0:?}")]
    InvalidSlot(String),
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with one slot, as if a previous process had persisted it.
    #[must_use]
    pub fn with_slot(slot: &str, value: &str) -> Self {
        let storage = Self::default();
        storage.lock().insert(slot.to_string(), value.to_string());
        storage
    }

    pub fn contains(&self, slot: &str) -> bool {
        self.lock().contains_key(slot)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStorage for MemoryStorage {
    fn load(&self, slot: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(slot).cloned())
    }

    fn save(&self, slot: &str, value: &str) -> Result<(), StorageError> {
        self.lock().insert(slot.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<(), StorageError> {
        self.lock().remove(slot);
        Ok(())
    }
}

/// One file per slot inside `dir`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<platform data dir>/gwadmin`, e.g. `~/.local/share/gwadmin` on Linux.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("gwadmin"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, slot: &str) -> Result<PathBuf, StorageError> {
        let valid = !slot.is_empty()
            && slot
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidSlot(slot.to_string()));
        }
        Ok(self.dir.join(slot))
    }
}

impl CredentialStorage for FileStorage {
    fn load(&self, slot: &str) -> Result<Option<String>, StorageError> {
        let path = self.slot_path(slot)?;
        match std::fs::read_to_string(&path) {
            Ok(v) => Ok(Some(v.trim_end().to_string())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read { path, source }),
        }
    }

    fn save(&self, slot: &str, value: &str) -> Result<(), StorageError> {
        let path = self.slot_path(slot)?;
        std::fs::create_dir_all(&self.dir).map_err(|source| StorageError::Write {
            path: self.dir.clone(),
            source,
        })?;

        // Write-then-rename so a crash never leaves a truncated token behind.
        let tmp = self.dir.join(format!(".{slot}.tmp"));
        write_private(&tmp, value).map_err(|source| StorageError::Write {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| StorageError::Write {
            path: path.clone(),
            source,
        })
    }

    fn remove(&self, slot: &str) -> Result<(), StorageError> {
        let path = self.slot_path(slot)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Remove { path, source }),
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, value: &str) -> io::Result<()> {
    use std::io::Write as _;
    use std::os::unix::fs::OpenOptionsExt as _;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(value.as_bytes())?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, value: &str) -> io::Result<()> {
    std::fs::write(path, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> tempfile::TempDir {
        match tempfile::tempdir() {
            Ok(v) => v,
            Err(err) => panic!("tempdir: {err}"),
        }
    }

    #[test]
    fn memory_storage_slots_are_independent() -> Result<(), StorageError> {
        let storage = MemoryStorage::new();
        storage.save("token", "abc")?;
        storage.save("other", "x")?;
        storage.remove("token")?;

        assert_eq!(storage.load("token")?, None);
        assert_eq!(storage.load("other")?.as_deref(), Some("x"));
        Ok(())
    }

    #[test]
    fn file_storage_roundtrips_and_overwrites() -> Result<(), StorageError> {
        let dir = temp_dir();
        let storage = FileStorage::new(dir.path().join("nested"));

        assert_eq!(storage.load("token")?, None);
        storage.save("token", "first")?;
        storage.save("token", "second")?;
        assert_eq!(storage.load("token")?.as_deref(), Some("second"));
        assert!(!dir.path().join("nested").join(".token.tmp").exists());
        Ok(())
    }

    #[test]
    fn file_storage_remove_is_idempotent() -> Result<(), StorageError> {
        let dir = temp_dir();
        let storage = FileStorage::new(dir.path());

        storage.remove("token")?;
        storage.save("token", "abc")?;
        storage.remove("token")?;
        storage.remove("token")?;
        assert!(!dir.path().join("token").exists());
        Ok(())
    }

    #[test]
    fn file_storage_trims_trailing_newline_from_hand_edited_files() -> Result<(), StorageError> {
        let dir = temp_dir();
        if let Err(err) = std::fs::write(dir.path().join("token"), "abc\n") {
            panic!("seed token: {err}");
        }
        let storage = FileStorage::new(dir.path());
        assert_eq!(storage.load("token")?.as_deref(), Some("abc"));
        Ok(())
    }

    #[test]
    fn file_storage_rejects_path_like_slots() {
        let dir = temp_dir();
        let storage = FileStorage::new(dir.path());
        assert!(matches!(
            storage.save("../escape", "x"),
            Err(StorageError::InvalidSlot(_))
        ));
        assert!(matches!(
            storage.load(""),
            Err(StorageError::InvalidSlot(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn file_storage_keeps_token_private() -> Result<(), StorageError> {
        use std::os::unix::fs::PermissionsExt as _;

        let dir = temp_dir();
        let storage = FileStorage::new(dir.path());
        storage.save("token", "abc")?;

        let mode = match std::fs::metadata(dir.path().join("token")) {
            Ok(m) => m.permissions().mode(),
            Err(err) => panic!("metadata: {err}"),
        };
        assert_eq!(mode & 0o077, 0, "token file must not be group/world readable");
        Ok(())
    }
}
