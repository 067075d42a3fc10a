// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of source an item came from. Drives categorization and default markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    ResearchBlog,
    Community,
    GithubTrending,
}

impl SourceKind {
    /// Marker used for items whose source has no explicit emoji.
    pub fn default_marker(self) -> &'static str {
        match self {
            SourceKind::ResearchBlog => "📝",
            SourceKind::Community => "💬",
            SourceKind::GithubTrending => "⭐",
        }
    }
}

/// One item as handed over by a collector, before any normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    pub url: String,
    pub source: SourceKind,
    pub source_name: String, // e.g. "Hugging Face Blog", "GitHub Trending (nlp)"
    pub published_at: DateTime<Utc>,
    pub summary: Option<String>,
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>>;
    fn name(&self) -> &str;
}
