use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::task::JoinSet;

use crate::ingest::types::{RawItem, SourceKind, SourceProvider};

pub const HN_API_BASE: &str = "https://hacker-news.firebaseio.com/v0";
pub const HN_SOURCE_NAME: &str = "Hacker News";

/// Item as returned by `/v0/item/{id}.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HnStory {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub dead: bool,
    #[serde(default)]
    pub deleted: bool,
}

/// Map a story to a raw item. Dead and deleted stories yield nothing; a story
/// without an external link points at its discussion page.
pub fn story_to_item(story: HnStory, fetched_at: DateTime<Utc>) -> Option<RawItem> {
    if story.dead || story.deleted {
        return None;
    }
    let url = story
        .url
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| format!("https://news.ycombinator.com/item?id={}", story.id));
    Some(RawItem {
        title: story.title.unwrap_or_default(),
        url,
        source: SourceKind::Community,
        source_name: HN_SOURCE_NAME.to_string(),
        published_at: story
            .time
            .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
            .unwrap_or(fetched_at),
        summary: story.text,
    })
}

/// Top stories from the Hacker News Firebase API.
pub struct HackerNewsProvider {
    api_base: String,
    limit: usize,
    client: reqwest::Client,
}

impl HackerNewsProvider {
    pub fn new(limit: usize, client: reqwest::Client) -> Self {
        Self {
            api_base: HN_API_BASE.to_string(),
            limit,
            client,
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    async fn top_ids(&self) -> Result<Vec<u64>> {
        let url = format!("{}/topstories.json", self.api_base);
        let ids: Vec<u64> = self
            .client
            .get(&url)
            .send()
            .await
            .context("hn topstories get()")?
            .error_for_status()
            .context("hn topstories status")?
            .json()
            .await
            .context("hn topstories json")?;
        Ok(ids)
    }
}

async fn fetch_story(client: reqwest::Client, url: String) -> Result<HnStory> {
    let story = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("hn get {url}"))?
        .error_for_status()?
        .json::<HnStory>()
        .await
        .with_context(|| format!("hn json {url}"))?;
    Ok(story)
}

#[async_trait]
impl SourceProvider for HackerNewsProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        let ids = self.top_ids().await?;
        let fetched_at = Utc::now();

        let mut set = JoinSet::new();
        for (pos, id) in ids.into_iter().take(self.limit).enumerate() {
            let url = format!("{}/item/{id}.json", self.api_base);
            let client = self.client.clone();
            set.spawn(async move { (pos, fetch_story(client, url).await) });
        }

        let mut stories: Vec<(usize, HnStory)> = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((pos, Ok(story))) => stories.push((pos, story)),
                Ok((_, Err(e))) => {
                    tracing::debug!(target: "collect", error = %format!("{e:#}"), "hn story skipped")
                }
                Err(e) => tracing::debug!(target: "collect", error = %e, "hn story task aborted"),
            }
        }
        // keep the ranking order of topstories
        stories.sort_by_key(|(pos, _)| *pos);

        Ok(stories
            .into_iter()
            .filter_map(|(_, s)| story_to_item(s, fetched_at))
            .collect())
    }

    fn name(&self) -> &str {
        HN_SOURCE_NAME
    }
}
