//! # Scorer
//!
//! Keyword relevance scoring, thresholding and ranking.
//!
//! - A keyword matches when it occurs as a case-insensitive substring of
//!   `"{source_name}: {title}" + " " + summary`. The source label counts, so
//!   "GitHub Trending (python)" brings `trending` and "OpenAI Blog" brings `openai`.
//!   The displayed title stays bare.
//! - Each matched keyword adds its weight exactly once; negative weights
//!   pull noisy items below the threshold.
//! - Ranking is `(score desc, published_at desc, identity key asc)`, so the
//!   output never depends on discovery order.

use std::cmp::Ordering;
use std::sync::Arc;

use metrics::counter;

use crate::normalize::NewsItem;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeywordTableError {
    #[error("blank keyword")]
    Blank,
    #[error("keyword {0:?} appears more than once (keywords are case-insensitive)")]
    Duplicate(String),
}

/// Immutable keyword → weight table. Keywords are stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordTable {
    entries: Vec<(String, i32)>,
}

impl KeywordTable {
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, KeywordTableError>
    where
        I: IntoIterator<Item = (&'a str, i32)>,
    {
        let mut entries: Vec<(String, i32)> = Vec::new();
        for (kw, weight) in pairs {
            let kw = kw.trim().to_lowercase();
            if kw.is_empty() {
                return Err(KeywordTableError::Blank);
            }
            if entries.iter().any(|(k, _)| *k == kw) {
                return Err(KeywordTableError::Duplicate(kw));
            }
            entries.push((kw, weight));
        }
        entries.sort();
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keywords found in the text, in table order.
    pub fn matched<'a>(&'a self, title: &str, summary: Option<&str>) -> Vec<&'a str> {
        let text = haystack(title, summary);
        self.entries
            .iter()
            .filter(|(kw, _)| text.contains(kw.as_str()))
            .map(|(kw, _)| kw.as_str())
            .collect()
    }

    pub fn score_text(&self, title: &str, summary: Option<&str>) -> i32 {
        let text = haystack(title, summary);
        self.entries
            .iter()
            .filter(|(kw, _)| text.contains(kw.as_str()))
            .map(|(_, w)| *w)
            .sum()
    }
}

fn haystack(title: &str, summary: Option<&str>) -> String {
    match summary {
        Some(s) => format!("{title} {s}").to_lowercase(),
        None => title.to_lowercase(),
    }
}

/// Text an item is scored on: its title prefixed with the source label.
pub fn labelled_title(item: &NewsItem) -> String {
    format!("{}: {}", item.source_name, item.title)
}

/// Score one item against a table.
pub fn score(item: &NewsItem, table: &KeywordTable) -> i32 {
    table.score_text(&labelled_title(item), item.summary.as_deref())
}

/// Total order used everywhere items are ranked.
pub fn rank_order(a: &NewsItem, b: &NewsItem) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.published_at.cmp(&a.published_at))
        .then_with(|| a.identity_key.cmp(&b.identity_key))
}

/// Items that passed the threshold, ranked, plus how many were discarded.
#[derive(Debug, Default)]
pub struct Ranked {
    pub kept: Vec<NewsItem>,
    pub below_threshold: usize,
}

#[derive(Debug, Clone)]
pub struct Scorer {
    table: Arc<KeywordTable>,
    min_score: i32,
    max_items: usize,
}

impl Scorer {
    pub fn new(table: KeywordTable, min_score: i32, max_items: usize) -> Self {
        Self {
            table: Arc::new(table),
            min_score,
            max_items,
        }
    }

    pub fn table(&self) -> &KeywordTable {
        &self.table
    }

    pub fn min_score(&self) -> i32 {
        self.min_score
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Score every item, discard those below `min_score` and sort the rest.
    /// Discarded items are only counted; nothing about them is remembered.
    pub fn rank(&self, items: Vec<NewsItem>) -> Ranked {
        let mut out = Ranked::default();
        for mut item in items {
            item.score = score(&item, &self.table);
            if item.score < self.min_score {
                tracing::debug!(
                    target: "digest",
                    score = item.score,
                    key = %item.identity_key,
                    "below threshold"
                );
                out.below_threshold += 1;
                continue;
            }
            out.kept.push(item);
        }
        out.kept.sort_by(rank_order);
        counter!("digest_items_below_threshold_total").increment(out.below_threshold as u64);
        out
    }

    /// Keep the `max_items` best ranked items. Returns how many were cut.
    pub fn cap(&self, mut ranked: Vec<NewsItem>) -> (Vec<NewsItem>, usize) {
        let excess = ranked.len().saturating_sub(self.max_items);
        ranked.truncate(self.max_items);
        if excess > 0 {
            counter!("digest_items_capped_total").increment(excess as u64);
        }
        (ranked, excess)
    }
}
