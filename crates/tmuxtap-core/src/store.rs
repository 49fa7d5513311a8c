//! Record store
//!
//! A narrow key-value interface over a shared scratch directory: one JSON
//! file per record, deterministic key-derived filenames. Writers and the
//! matcher get this injected instead of reaching for ambient paths, so the
//! storage mechanism stays swappable.
//!
//! Reads are deliberately forgiving: a missing directory or an unparseable
//! file is simply absent, never fatal to a lookup.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// File-backed record store
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a record under `<dir>/<key>.json`, replacing any previous
    /// record with the same key (last writer wins).
    pub fn put<T: Serialize>(&self, key: &str, record: &T) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create store dir {}", self.dir.display()))?;
        let path = self.dir.join(format!("{key}.json"));
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write record {}", path.display()))?;
        debug!(path = %path.display(), "Record written");
        Ok(path)
    }

    /// Load every record whose filename starts with `prefix`. Unreadable or
    /// unparseable files are skipped.
    pub fn get_all<T: DeserializeOwned>(&self, prefix: &str) -> Vec<(PathBuf, T)> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.dir.display(), error = %e, "Store dir not readable");
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(prefix) || !name.ends_with(".json") {
                continue;
            }
            let path = entry.path();
            let content = match fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping unreadable record");
                    continue;
                }
            };
            match serde_json::from_str::<T>(&content) {
                Ok(record) => records.push((path, record)),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping unparseable record");
                }
            }
        }
        records
    }

    /// Delete a record file. Missing files are fine.
    pub fn remove(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "Record removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Rec {
        name: String,
        value: i64,
    }

    #[test]
    fn test_put_then_get_all() {
        let dir = tempdir().unwrap();
        let store = RecordStore::new(dir.path());

        store
            .put(
                "pending-relay-a",
                &Rec {
                    name: "a".to_string(),
                    value: 1,
                },
            )
            .unwrap();
        store
            .put(
                "pending-relay-b",
                &Rec {
                    name: "b".to_string(),
                    value: 2,
                },
            )
            .unwrap();
        store
            .put(
                "discord-thread-a",
                &Rec {
                    name: "t".to_string(),
                    value: 3,
                },
            )
            .unwrap();

        let pending: Vec<(PathBuf, Rec)> = store.get_all("pending-relay-");
        assert_eq!(pending.len(), 2);
        let threads: Vec<(PathBuf, Rec)> = store.get_all("discord-thread-");
        assert_eq!(threads.len(), 1);
    }

    #[test]
    fn test_put_overwrites_same_key() {
        let dir = tempdir().unwrap();
        let store = RecordStore::new(dir.path());

        store
            .put(
                "pending-relay-a",
                &Rec {
                    name: "old".to_string(),
                    value: 1,
                },
            )
            .unwrap();
        store
            .put(
                "pending-relay-a",
                &Rec {
                    name: "new".to_string(),
                    value: 2,
                },
            )
            .unwrap();

        let records: Vec<(PathBuf, Rec)> = store.get_all("pending-relay-");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1.name, "new");
    }

    #[test]
    fn test_unparseable_records_skipped() {
        let dir = tempdir().unwrap();
        let store = RecordStore::new(dir.path());

        store
            .put(
                "pending-relay-good",
                &Rec {
                    name: "good".to_string(),
                    value: 1,
                },
            )
            .unwrap();
        fs::write(dir.path().join("pending-relay-bad.json"), "not json{").unwrap();

        let records: Vec<(PathBuf, Rec)> = store.get_all("pending-relay-");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1.name, "good");
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let store = RecordStore::new("/nonexistent/tmuxtap-test-store");
        let records: Vec<(PathBuf, Rec)> = store.get_all("pending-relay-");
        assert!(records.is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let path = store
            .put(
                "pending-relay-a",
                &Rec {
                    name: "a".to_string(),
                    value: 1,
                },
            )
            .unwrap();

        store.remove(&path).unwrap();
        store.remove(&path).unwrap();
        let records: Vec<(PathBuf, Rec)> = store.get_all("pending-relay-");
        assert!(records.is_empty());
    }
}
