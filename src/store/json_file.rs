// src/store/json_file.rs
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use super::SentStore;
use crate::error::StoreError;
use crate::normalize::IdentityKey;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    sent: BTreeMap<IdentityKey, DateTime<Utc>>,
}

/// Durable store backed by one JSON file. Loaded fully on open; every commit
/// rewrites the file through a temp file + rename so a crash never leaves a
/// half-written store behind.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    records: Mutex<BTreeMap<IdentityKey, DateTime<Utc>>>,
}

impl JsonFileStore {
    /// A missing or empty file is a fresh store, not an error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = match fs::read_to_string(&path).await {
            Ok(s) if s.trim().is_empty() => BTreeMap::new(),
            Ok(s) => {
                let file: StoreFile =
                    serde_json::from_str(&s).map_err(|source| StoreError::Corrupt {
                        path: path.clone(),
                        source,
                    })?;
                file.sent
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(target: "store", path = %path.display(), "no sent store yet, starting empty");
                BTreeMap::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        tracing::debug!(target: "store", path = %path.display(), records = records.len(), "sent store loaded");
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("sent store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn persist(&self, file: &StoreFile) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await.map_err(io_err)?;
        }

        let body = serde_json::to_vec_pretty(file).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, body).await.map_err(io_err)?;
        fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl SentStore for JsonFileStore {
    async fn contains(&self, key: &IdentityKey) -> Result<bool, StoreError> {
        Ok(self
            .records
            .lock()
            .expect("sent store mutex poisoned")
            .contains_key(key))
    }

    async fn insert_all(
        &self,
        keys: &[IdentityKey],
        delivered_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }

        // Build the next state aside; memory only changes once the file is written.
        let next = {
            let current = self.records.lock().expect("sent store mutex poisoned");
            let mut next = current.clone();
            for k in keys {
                next.entry(k.clone()).or_insert(delivered_at);
            }
            next
        };

        let file = StoreFile {
            version: FORMAT_VERSION,
            sent: next,
        };
        self.persist(&file).await?;

        *self.records.lock().expect("sent store mutex poisoned") = file.sent;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn k(s: &str) -> IdentityKey {
        IdentityKey::from_url(s).unwrap()
    }

    #[tokio::test]
    async fn missing_file_is_a_fresh_store() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(tmp.path().join("nested/sent.json"))
            .await
            .unwrap();
        assert!(store.is_empty());
        assert!(!store.contains(&k("https://a.test/x")).await.unwrap());
    }

    #[tokio::test]
    async fn commits_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state/sent.json");
        let t0 = Utc.with_ymd_and_hms(2025, 5, 1, 7, 30, 0).unwrap();

        let store = JsonFileStore::open(&path).await.unwrap();
        store
            .insert_all(&[k("https://a.test/1"), k("https://a.test/2")], t0)
            .await
            .unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.contains(&k("https://A.test/1/")).await.unwrap());

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"version\": 1"));
        assert!(raw.contains("https://a.test/2"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sent.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonFileStore::open(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn failed_write_leaves_memory_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sent.json");
        // A directory squatting on the temp file name makes the write fail.
        std::fs::create_dir(tmp.path().join("sent.json.tmp")).unwrap();
        let store = JsonFileStore::open(&path).await.unwrap();

        let res = store.insert_all(&[k("https://a.test/1")], Utc::now()).await;
        assert!(matches!(res, Err(StoreError::Io { .. })));
        assert!(!store.contains(&k("https://a.test/1")).await.unwrap());
        assert!(!path.exists());
    }
}
