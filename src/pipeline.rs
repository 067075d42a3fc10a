//! # Digest Pipeline
//! Normalize → score → dedup → cap → categorize → assemble, then deliver
//! message by message and commit each message's items once it is confirmed.
//!
//! `prepare` is deterministic given the raw items, the store contents and the
//! timestamp. `deliver` is the only step that talks to the notifier or writes
//! to the store.

use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use metrics::counter;

use crate::categorize::Categorizer;
use crate::config::DigestConfig;
use crate::dedup;
use crate::digest::{DigestAssembler, DigestMessage};
use crate::error::{DeliveryError, StoreError};
use crate::ingest::types::RawItem;
use crate::normalize::normalize_all;
use crate::notify::Notifier;
use crate::scoring::Scorer;
use crate::store::SentStore;

/// Per-stage counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub collected: usize,
    pub malformed: usize,
    pub below_threshold: usize,
    pub already_sent: usize,
    pub repeated_in_run: usize,
    pub capped: usize,
    /// Items placed into the digest.
    pub selected: usize,
}

/// Rendered digest, ready to send.
#[derive(Debug)]
pub struct PreparedDigest {
    pub messages: Vec<DigestMessage>,
    pub stats: RunStats,
    /// Set when the store could not be read; commits are then skipped.
    pub store_error: Option<StoreError>,
}

impl PreparedDigest {
    pub fn store_available(&self) -> bool {
        self.store_error.is_none()
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub stats: RunStats,
    pub messages_total: usize,
    pub messages_sent: usize,
    pub items_committed: usize,
    /// First delivery failure. Later messages were not attempted.
    pub delivery_error: Option<DeliveryError>,
    /// First commit failure. Later commits were skipped.
    pub commit_error: Option<StoreError>,
    /// No commit happened for at least one delivered message.
    pub commit_skipped: bool,
}

impl RunReport {
    /// There was something to deliver and nothing got through.
    pub fn total_delivery_failure(&self) -> bool {
        self.messages_total > 0 && self.messages_sent == 0
    }
}

#[derive(Debug, Clone)]
pub struct DigestPipeline {
    scorer: Scorer,
    categorizer: Categorizer,
    assembler: DigestAssembler,
    inter_message_delay: Duration,
}

impl DigestPipeline {
    pub fn new(
        scorer: Scorer,
        categorizer: Categorizer,
        assembler: DigestAssembler,
        inter_message_delay: Duration,
    ) -> Self {
        Self {
            scorer,
            categorizer,
            assembler,
            inter_message_delay,
        }
    }

    /// Wire all stages from validated config. `channel` ends up in the footer.
    pub fn from_config(cfg: &DigestConfig, channel: &str) -> Result<Self> {
        let scorer = Scorer::new(
            cfg.keyword_table()?,
            cfg.digest.min_score,
            cfg.digest.max_items,
        );
        let assembler = DigestAssembler::new(&cfg.digest.title, channel, cfg.digest.max_message_len)
            .with_markers(cfg.markers());
        Ok(Self::new(
            scorer,
            Categorizer::new(cfg.digest.big_release_threshold),
            assembler,
            cfg.inter_message_delay(),
        ))
    }

    pub async fn prepare(
        &self,
        raw: Vec<RawItem>,
        store: &dyn SentStore,
        generated_at: DateTime<FixedOffset>,
    ) -> PreparedDigest {
        let mut stats = RunStats {
            collected: raw.len(),
            ..Default::default()
        };

        let (items, malformed) = normalize_all(raw);
        stats.malformed = malformed.len();

        let ranked = self.scorer.rank(items);
        stats.below_threshold = ranked.below_threshold;

        let fresh = dedup::filter_new(ranked.kept, store).await;
        stats.already_sent = fresh.already_sent;
        stats.repeated_in_run = fresh.repeated_in_run;

        let (selected, capped) = self.scorer.cap(fresh.fresh);
        stats.capped = capped;
        stats.selected = selected.len();

        let categorized = self.categorizer.categorize(selected);
        let messages = self.assembler.assemble(&categorized, generated_at);

        tracing::info!(
            target: "digest",
            collected = stats.collected,
            malformed = stats.malformed,
            below_threshold = stats.below_threshold,
            already_sent = stats.already_sent,
            repeated = stats.repeated_in_run,
            capped = stats.capped,
            selected = stats.selected,
            messages = messages.len(),
            "digest prepared"
        );

        PreparedDigest {
            messages,
            stats,
            store_error: fresh.store_error,
        }
    }

    /// Send parts in order. Each confirmed part is committed before the next is
    /// sent; the first failed part stops delivery.
    pub async fn deliver(
        &self,
        prepared: PreparedDigest,
        notifier: &dyn Notifier,
        store: &dyn SentStore,
    ) -> RunReport {
        let mut report = RunReport {
            stats: prepared.stats,
            messages_total: prepared.messages.len(),
            commit_skipped: !prepared.messages.is_empty() && prepared.store_error.is_some(),
            ..Default::default()
        };
        let mut may_commit = prepared.store_error.is_none();
        if !may_commit {
            tracing::warn!(target: "store", "store was unreadable; delivered items will not be recorded");
        }

        for (idx, msg) in prepared.messages.iter().enumerate() {
            if idx > 0 && !self.inter_message_delay.is_zero() {
                tokio::time::sleep(self.inter_message_delay).await;
            }

            if let Err(e) = notifier.send(&msg.text).await {
                tracing::error!(
                    target: "digest",
                    part = msg.part,
                    of = report.messages_total,
                    error = %e,
                    "delivery failed; remaining parts not sent"
                );
                counter!("digest_messages_failed_total").increment(1);
                report.delivery_error = Some(e);
                break;
            }
            report.messages_sent += 1;
            counter!("digest_messages_sent_total").increment(1);
            tracing::info!(
                target: "digest",
                part = msg.part,
                items = msg.items.len(),
                destination = notifier.destination(),
                "message delivered"
            );

            if !may_commit {
                report.commit_skipped = true;
                continue;
            }
            match dedup::commit(&msg.items, store, Utc::now()).await {
                Ok(n) => report.items_committed += n,
                Err(e) => {
                    tracing::warn!(
                        target: "store",
                        part = msg.part,
                        error = %e,
                        "commit failed; later parts will not be recorded"
                    );
                    counter!("digest_store_errors_total").increment(1);
                    report.commit_error = Some(e);
                    report.commit_skipped = true;
                    may_commit = false;
                }
            }
        }

        tracing::info!(
            target: "digest",
            sent = report.messages_sent,
            total = report.messages_total,
            committed = report.items_committed,
            commit_skipped = report.commit_skipped,
            "delivery finished"
        );
        report
    }

    pub async fn run(
        &self,
        raw: Vec<RawItem>,
        store: &dyn SentStore,
        notifier: &dyn Notifier,
        generated_at: DateTime<FixedOffset>,
    ) -> RunReport {
        let prepared = self.prepare(raw, store, generated_at).await;
        self.deliver(prepared, notifier, store).await
    }
}
