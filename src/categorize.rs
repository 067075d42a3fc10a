//! # Categorizer
//!
//! Splits surviving items into exactly one bucket each. The score check runs
//! before the source check, so a high-scoring trending repo is a Big Release.

use serde::{Deserialize, Serialize};

use crate::ingest::types::SourceKind;
use crate::normalize::NewsItem;

pub const DEFAULT_BIG_RELEASE_THRESHOLD: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    BigReleases,
    HotTrending,
    FlashNews,
}

impl Category {
    /// Presentation order in a digest.
    pub const ALL: [Category; 3] = [
        Category::BigReleases,
        Category::HotTrending,
        Category::FlashNews,
    ];

    pub fn heading(self) -> &'static str {
        match self {
            Category::BigReleases => "Big Releases",
            Category::HotTrending => "Hot on GitHub",
            Category::FlashNews => "Flash News",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Category::BigReleases => "🚀",
            Category::HotTrending => "🔥",
            Category::FlashNews => "⚡",
        }
    }
}

/// The three buckets, each in ranking order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Categorized {
    pub big_releases: Vec<NewsItem>,
    pub hot_trending: Vec<NewsItem>,
    pub flash_news: Vec<NewsItem>,
}

impl Categorized {
    pub fn bucket(&self, category: Category) -> &[NewsItem] {
        match category {
            Category::BigReleases => &self.big_releases,
            Category::HotTrending => &self.hot_trending,
            Category::FlashNews => &self.flash_news,
        }
    }

    pub fn len(&self) -> usize {
        self.big_releases.len() + self.hot_trending.len() + self.flash_news.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Categorizer {
    big_release_threshold: i32,
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new(DEFAULT_BIG_RELEASE_THRESHOLD)
    }
}

impl Categorizer {
    pub fn new(big_release_threshold: i32) -> Self {
        Self {
            big_release_threshold,
        }
    }

    pub fn classify(&self, item: &NewsItem) -> Category {
        if item.score >= self.big_release_threshold {
            Category::BigReleases
        } else if item.source == SourceKind::GithubTrending {
            Category::HotTrending
        } else {
            Category::FlashNews
        }
    }

    /// Partition ranked items. Relative order inside each bucket is preserved.
    pub fn categorize(&self, items: Vec<NewsItem>) -> Categorized {
        let mut out = Categorized::default();
        for mut item in items {
            let category = self.classify(&item);
            item.category = Some(category);
            match category {
                Category::BigReleases => out.big_releases.push(item),
                Category::HotTrending => out.hot_trending.push(item),
                Category::FlashNews => out.flash_news.push(item),
            }
        }
        out
    }
}
