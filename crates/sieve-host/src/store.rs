use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sieve_core::{CountStore, CountStoreError};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCount {
    #[serde(default)]
    filtering_blocked_count: u64,
}

/// Keeps the blocked-request total in a small JSON file.
#[derive(Debug)]
pub struct JsonCountStore {
    path: PathBuf,
    // Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl JsonCountStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<u64, CountStoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => {
                let stored: StoredCount = serde_json::from_str(&text)?;
                Ok(stored.filtering_blocked_count)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, total: u64) -> Result<(), CountStoreError> {
        let json = serde_json::to_vec(&StoredCount {
            filtering_blocked_count: total,
        })?;
        // Write next to the target and rename, so a crash never leaves half a file
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CountStore for JsonCountStore {
    fn load(&self) -> Result<u64, CountStoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.read()
    }

    fn add(&self, delta: u64) -> Result<u64, CountStoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let stored = match self.read() {
            Ok(stored) => stored,
            // Unreadable contents would otherwise block every later flush
            Err(CountStoreError::Json(err)) => {
                log::warn!(
                    "blocked-request count in {} is corrupt, overwriting it: {err}",
                    self.path.display()
                );
                0
            }
            Err(err) => return Err(err),
        };
        let total = stored.saturating_add(delta);
        self.write(total)?;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCountStore::new(dir.path().join("count.json"));
        assert_eq!(store.load().unwrap(), 0);
    }

    #[test]
    fn add_accumulates_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("count.json");
        let store = JsonCountStore::new(&path);

        assert_eq!(store.add(3).unwrap(), 3);
        assert_eq!(store.add(4).unwrap(), 7);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, r#"{"filteringBlockedCount":7}"#);
        assert_eq!(JsonCountStore::new(&path).load().unwrap(), 7);
    }

    #[test]
    fn corrupt_file_fails_load_but_is_overwritten_by_add() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("count.json");
        std::fs::write(&path, r#"{"filteringBlockedCount":"#).unwrap();
        let store = JsonCountStore::new(&path);
        assert!(matches!(store.load(), Err(CountStoreError::Json(_))));

        assert_eq!(store.add(1).unwrap(), 1);
        assert_eq!(store.add(2).unwrap(), 3);
        assert_eq!(store.load().unwrap(), 3);
    }

    #[test]
    fn unreadable_path_is_still_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCountStore::new(dir.path());
        assert!(matches!(store.add(1), Err(CountStoreError::Io(_))));
    }
}
