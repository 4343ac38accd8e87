//! Session store persisted as a JSON object on disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use estimator_core::{SessionError, SessionStore};
use tracing::{debug, warn};

/// Default location: `<config dir>/estimator/session.json`, falling back to
/// the working directory when the platform has no config dir.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("estimator")
        .join("session.json")
}

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable one is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match read_entries(&path) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable session file");
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), SessionError> {
        write_entries(&self.path, &self.entries).map_err(|err| {
            warn!(path = %self.path.display(), error = %err, "failed to save session");
            SessionError::Persist(format!("{err:#}"))
        })
    }

    /// Write the entries out, restoring `key` to `previous` if that fails.
    fn commit(&mut self, key: &str, previous: Option<String>) -> Result<(), SessionError> {
        let result = self.flush();
        if result.is_err() {
            match previous {
                Some(value) => self.entries.insert(key.to_string(), value),
                None => self.entries.remove(key),
            };
        }
        result
    }
}

fn read_entries(path: &Path) -> anyhow::Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let entries = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(entries)
}

fn write_entries(path: &Path, entries: &BTreeMap<String, String>) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let raw = serde_json::to_string_pretty(entries)?;
    fs::write(path, raw).with_context(|| format!("writing {}", path.display()))?;
    debug!(path = %path.display(), "session saved");
    Ok(())
}

impl SessionStore for FileStore {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn store(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
        let previous = self.entries.insert(key.to_string(), value.to_string());
        self.commit(key, previous)
    }

    fn remove(&mut self, key: &str) -> Result<(), SessionError> {
        match self.entries.remove(key) {
            Some(previous) => self.commit(key, Some(previous)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new("estimator").unwrap();
        let store = FileStore::open(dir.path().join("session.json"));
        assert_eq!(store.load("token"), None);
    }

    #[test]
    fn values_survive_reopen() {
        let dir = TempDir::new("estimator").unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut store = FileStore::open(&path);
        store.store("token", "abc123").unwrap();
        assert!(path.exists());

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.load("token").as_deref(), Some("abc123"));
    }

    #[test]
    fn remove_persists() {
        let dir = TempDir::new("estimator").unwrap();
        let path = dir.path().join("session.json");

        let mut store = FileStore::open(&path);
        store.store("token", "abc123").unwrap();
        store.remove("token").unwrap();

        assert_eq!(FileStore::open(&path).load("token"), None);
    }

    #[test]
    fn corrupt_file_is_treated_as_empty() {
        let dir = TempDir::new("estimator").unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        let mut store = FileStore::open(&path);
        assert_eq!(store.load("token"), None);
        store.store("token", "fresh").unwrap();
        assert_eq!(FileStore::open(&path).load("token").as_deref(), Some("fresh"));
    }

    #[test]
    fn unwritable_path_reports_the_failure() {
        let dir = TempDir::new("estimator").unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "a regular file").unwrap();
        let path = blocker.join("session.json");

        let mut store = FileStore::open(&path);
        let err = store.store("token", "abc123").unwrap_err();
        assert!(matches!(err, SessionError::Persist(_)));
        // Nothing half-saved: memory agrees with disk.
        assert_eq!(store.load("token"), None);
        assert_eq!(FileStore::open(&path).load("token"), None);
    }

    #[test]
    fn failed_remove_keeps_the_value() {
        let dir = TempDir::new("estimator").unwrap();
        let path = dir.path().join("session.json");
        let mut store = FileStore::open(&path);
        store.store("token", "abc123").unwrap();

        // Swap the file for a directory so the next write fails.
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        assert!(store.remove("token").is_err());
        assert_eq!(store.load("token").as_deref(), Some("abc123"));
    }

    #[test]
    fn removing_a_missing_key_writes_nothing() {
        let dir = TempDir::new("estimator").unwrap();
        let path = dir.path().join("session.json");
        let mut store = FileStore::open(&path);
        store.remove("token").unwrap();
        assert!(!path.exists());
    }
}
