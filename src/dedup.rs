//! # Deduplicator
//!
//! Last gate before categorization. Drops items whose identity key is already
//! in the sent store, and later copies of a key seen earlier in the same run.
//!
//! Commit granularity is one delivered message: the caller commits exactly the
//! items of a message after the notifier confirmed it, never before. A failed
//! message leaves its items uncommitted, so delivery is at-least-once.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::error::StoreError;
use crate::normalize::{IdentityKey, NewsItem};
use crate::store::SentStore;

#[derive(Debug, Default)]
pub struct DedupOutcome {
    /// Survivors, in input order.
    pub fresh: Vec<NewsItem>,
    /// Dropped because the store already had them.
    pub already_sent: usize,
    /// Dropped because an earlier item in this run had the same key.
    pub repeated_in_run: usize,
    /// Set when the store could not be read. Reads then count as "not sent".
    pub store_error: Option<StoreError>,
}

impl DedupOutcome {
    pub fn store_available(&self) -> bool {
        self.store_error.is_none()
    }
}

/// Keep only items not delivered before. Expects ranked input, so the
/// best-ranked copy of a repeated key is the one that stays.
pub async fn filter_new(items: Vec<NewsItem>, store: &dyn SentStore) -> DedupOutcome {
    let mut out = DedupOutcome::default();
    let mut seen: HashSet<IdentityKey> = HashSet::with_capacity(items.len());

    for item in items {
        if !seen.insert(item.identity_key.clone()) {
            out.repeated_in_run += 1;
            continue;
        }

        if out.store_error.is_none() {
            match store.contains(&item.identity_key).await {
                Ok(true) => {
                    out.already_sent += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        target: "store",
                        error = %e,
                        "sent store unreadable, treating as empty; commit will be skipped"
                    );
                    counter!("digest_store_errors_total").increment(1);
                    out.store_error = Some(e);
                }
            }
        }
        out.fresh.push(item);
    }

    counter!("digest_items_duplicate_total")
        .increment((out.already_sent + out.repeated_in_run) as u64);
    out
}

/// Record delivered items. Returns how many keys were written.
pub async fn commit(
    delivered: &[NewsItem],
    store: &dyn SentStore,
    delivered_at: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let keys: Vec<IdentityKey> = delivered.iter().map(|i| i.identity_key.clone()).collect();
    store.insert_all(&keys, delivered_at).await?;
    counter!("digest_items_committed_total").increment(keys.len() as u64);
    Ok(keys.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::SourceKind;
    use crate::store::{MemoryStore, UnavailableStore};

    fn item(url: &str, score: i32) -> NewsItem {
        NewsItem {
            title: url.into(),
            url: url.into(),
            summary: None,
            source: SourceKind::ResearchBlog,
            source_name: "t".into(),
            published_at: Utc::now(),
            identity_key: IdentityKey::from_url(url).unwrap(),
            score,
            category: None,
        }
    }

    #[tokio::test]
    async fn stored_key_is_dropped_regardless_of_score() {
        let store = MemoryStore::with_keys(
            [IdentityKey::from_url("https://d.test/hot").unwrap()],
            Utc::now(),
        );
        let out = filter_new(
            vec![item("https://d.test/hot/?utm_source=x", 10), item("https://d.test/new", 3)],
            &store,
        )
        .await;
        assert_eq!(out.already_sent, 1);
        assert_eq!(out.fresh.len(), 1);
        assert_eq!(out.fresh[0].url, "https://d.test/new");
        assert!(out.store_available());
    }

    #[tokio::test]
    async fn first_copy_of_a_key_wins_within_a_run() {
        let store = MemoryStore::new();
        let out = filter_new(
            vec![item("https://d.test/a", 9), item("https://D.test/a/", 4)],
            &store,
        )
        .await;
        assert_eq!(out.repeated_in_run, 1);
        assert_eq!(out.fresh.len(), 1);
        assert_eq!(out.fresh[0].score, 9);
    }

    #[tokio::test]
    async fn unreadable_store_means_everything_is_new() {
        let store = UnavailableStore::new("gone");
        let out = filter_new(vec![item("https://d.test/a", 5), item("https://d.test/b", 5)], &store).await;
        assert_eq!(out.fresh.len(), 2);
        assert!(!out.store_available());
    }

    #[tokio::test]
    async fn commit_then_filter_is_idempotent() {
        let store = MemoryStore::new();
        let items = vec![item("https://d.test/a", 5), item("https://d.test/b", 5)];
        let n = commit(&items, &store, Utc::now()).await.unwrap();
        assert_eq!(n, 2);
        let out = filter_new(items, &store).await;
        assert!(out.fresh.is_empty());
        assert_eq!(out.already_sent, 2);
    }
}
