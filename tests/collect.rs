// tests/collect.rs
use std::sync::Arc;
use std::time::Duration;

use ai_news_digest::error::SourceUnavailableError;
use ai_news_digest::ingest::fetch_all;
use ai_news_digest::ingest::types::{RawItem, SourceKind, SourceProvider};
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;

struct FixedProvider {
    name: &'static str,
    urls: Vec<&'static str>,
    delay: Duration,
}

#[async_trait]
impl SourceProvider for FixedProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        tokio::time::sleep(self.delay).await;
        Ok(self
            .urls
            .iter()
            .map(|u| RawItem {
                title: format!("item from {}", self.name),
                url: (*u).to_string(),
                source: SourceKind::ResearchBlog,
                source_name: self.name.to_string(),
                published_at: Utc::now(),
                summary: None,
            })
            .collect())
    }

    fn name(&self) -> &str {
        self.name
    }
}

struct BrokenProvider;

#[async_trait]
impl SourceProvider for BrokenProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        bail!("HTTP 503 Service Unavailable")
    }

    fn name(&self) -> &str {
        "Broken Feed"
    }
}

fn fixed(name: &'static str, urls: Vec<&'static str>, delay_ms: u64) -> Arc<dyn SourceProvider> {
    Arc::new(FixedProvider {
        name,
        urls,
        delay: Duration::from_millis(delay_ms),
    })
}

#[tokio::test]
async fn failing_and_slow_sources_are_skipped() {
    let providers: Vec<Arc<dyn SourceProvider>> = vec![
        fixed("Fast", vec!["https://a.test/1"], 0),
        Arc::new(BrokenProvider),
        fixed("Slow", vec!["https://c.test/1"], 5_000),
        fixed("Also Fast", vec!["https://d.test/1", "https://d.test/2"], 10),
    ];

    let out = fetch_all(&providers, 4, Duration::from_millis(200)).await;

    let names: Vec<&str> = out.items.iter().map(|i| i.source_name.as_str()).collect();
    assert_eq!(names, ["Fast", "Also Fast", "Also Fast"]);

    assert_eq!(out.failures.len(), 2);
    assert!(out.failures.iter().any(|f| matches!(
        f,
        SourceUnavailableError::Failed { provider, message } if provider == "Broken Feed" && message.contains("503")
    )));
    assert!(out
        .failures
        .iter()
        .any(|f| matches!(f, SourceUnavailableError::Timeout { provider, .. } if provider == "Slow")));
}

#[tokio::test]
async fn output_follows_declaration_order_not_completion_order() {
    let providers: Vec<Arc<dyn SourceProvider>> = vec![
        fixed("First", vec!["https://a.test/1"], 80),
        fixed("Second", vec!["https://b.test/1"], 0),
        fixed("Third", vec!["https://c.test/1"], 40),
    ];

    // concurrency 1 still completes every source
    for concurrency in [1, 3] {
        let out = fetch_all(&providers, concurrency, Duration::from_secs(2)).await;
        let names: Vec<&str> = out.items.iter().map(|i| i.source_name.as_str()).collect();
        assert_eq!(names, ["First", "Second", "Third"]);
        assert!(out.failures.is_empty());
    }
}

#[tokio::test]
async fn no_sources_yields_nothing() {
    let out = fetch_all(&[], 4, Duration::from_secs(1)).await;
    assert!(out.items.is_empty());
    assert!(out.failures.is_empty());
}
