use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};

use crate::ingest::types::{RawItem, SourceKind, SourceProvider};

const GITHUB_BASE: &str = "https://github.com";

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e:?}"))
}

/// Parse a `github.com/trending/{topic}` page. Each `article.Box-row` is one repo:
/// title is `owner/repo`, the description (if any) becomes the summary.
/// Trending pages carry no dates, so every item is stamped with `fetched_at`.
pub fn parse_trending(
    html: &str,
    source_name: &str,
    limit: usize,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<RawItem>> {
    let document = Html::parse_document(html);
    let row_sel = selector("article.Box-row")?;
    let link_sel = selector("h2 a")?;
    let desc_sel = selector("p.col-9")?;

    let mut out = Vec::new();
    for row in document.select(&row_sel).take(limit) {
        let Some(link) = row.select(&link_sel).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let title: String = link
            .text()
            .collect::<String>()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let summary = row
            .select(&desc_sel)
            .next()
            .map(|d| d.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty());

        out.push(RawItem {
            title,
            url: format!("{GITHUB_BASE}{href}"),
            source: SourceKind::GithubTrending,
            source_name: source_name.to_string(),
            published_at: fetched_at,
            summary,
        });
    }

    if out.is_empty() {
        tracing::warn!(target: "collect", source = source_name, "no trending rows found; markup may have changed");
    }
    Ok(out)
}

/// Scrapes one GitHub trending topic page.
pub struct GithubTrendingProvider {
    name: String,
    url: String,
    limit: usize,
    client: reqwest::Client,
}

impl GithubTrendingProvider {
    pub fn new(name: impl Into<String>, topic: &str, limit: usize, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            url: format!("{GITHUB_BASE}/trending/{}", topic.trim()),
            limit,
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SourceProvider for GithubTrendingProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("{} http get()", self.name))?
            .error_for_status()
            .with_context(|| format!("{} http status", self.name))?
            .text()
            .await
            .with_context(|| format!("{} http .text()", self.name))?;
        parse_trending(&body, &self.name, self.limit, Utc::now())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
