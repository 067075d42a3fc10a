// src/store/mod.rs
//! Persisted record of delivered items (`identity key -> delivered at`).
//!
//! The store is the only state that survives between runs. It is single-writer:
//! runs against the same store must not overlap (see [`lock::RunLock`]).

pub mod json_file;
pub mod lock;

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::normalize::IdentityKey;

pub use json_file::JsonFileStore;
pub use lock::RunLock;

#[async_trait]
pub trait SentStore: Send + Sync {
    async fn contains(&self, key: &IdentityKey) -> Result<bool, StoreError>;

    /// Record keys as delivered. Keys already present keep their first timestamp.
    async fn insert_all(
        &self,
        keys: &[IdentityKey],
        delivered_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// In-process store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<IdentityKey, DateTime<Utc>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys<I: IntoIterator<Item = IdentityKey>>(keys: I, at: DateTime<Utc>) -> Self {
        Self {
            inner: Mutex::new(keys.into_iter().map(|k| (k, at)).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("memory store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn delivered_at(&self, key: &IdentityKey) -> Option<DateTime<Utc>> {
        self.inner
            .lock()
            .expect("memory store mutex poisoned")
            .get(key)
            .copied()
    }
}

#[async_trait]
impl SentStore for MemoryStore {
    async fn contains(&self, key: &IdentityKey) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .lock()
            .expect("memory store mutex poisoned")
            .contains_key(key))
    }

    async fn insert_all(
        &self,
        keys: &[IdentityKey],
        delivered_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut map = self.inner.lock().expect("memory store mutex poisoned");
        for k in keys {
            map.entry(k.clone()).or_insert(delivered_at);
        }
        Ok(())
    }
}

/// Stand-in used when the real store could not be opened. Every call fails,
/// which makes the pipeline read "nothing sent yet" and skip the commit.
#[derive(Debug, Clone)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl std::fmt::Display) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl SentStore for UnavailableStore {
    async fn contains(&self, _key: &IdentityKey) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable(self.reason.clone()))
    }

    async fn insert_all(
        &self,
        _keys: &[IdentityKey],
        _delivered_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable(self.reason.clone()))
    }
}
