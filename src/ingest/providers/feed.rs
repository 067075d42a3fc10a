use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::ingest::types::{RawItem, SourceKind, SourceProvider};

// --- RSS 2.0 ---

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

// --- Atom ---

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    link: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<AtomText>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

impl AtomEntry {
    /// `rel="alternate"` (or no rel) is the article link.
    fn article_link(&self) -> Option<String> {
        self.link
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| self.link.first())
            .and_then(|l| l.href.clone())
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .and_then(|dt| unix_to_utc(dt.unix_timestamp()))
        // obsolete zone names ("GMT", "EST") only parse here
        .or_else(|| {
            DateTime::parse_from_rfc2822(ts.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

fn parse_rfc3339(ts: &str) -> Option<DateTime<Utc>> {
    OffsetDateTime::parse(ts.trim(), &Rfc3339)
        .ok()
        .and_then(|dt| unix_to_utc(dt.unix_timestamp()))
}

/// HTML entities that are not valid XML and show up in real feeds.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

/// Static description of one feed.
#[derive(Debug, Clone)]
pub struct FeedMeta {
    pub name: String,
    pub kind: SourceKind,
    pub limit: usize,
}

/// Parse an RSS 2.0 or Atom document into raw items (first `limit` entries).
/// Entries without a link are skipped; entries without a date get `fetched_at`.
pub fn parse_feed(xml: &str, meta: &FeedMeta, fetched_at: DateTime<Utc>) -> Result<Vec<RawItem>> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);

    let out = match from_str::<Rss>(&xml_clean) {
        Ok(rss) => rss
            .channel
            .item
            .into_iter()
            .take(meta.limit)
            .filter_map(|it| {
                let url = it.link?.trim().to_string();
                if url.is_empty() {
                    return None;
                }
                Some(RawItem {
                    title: it.title.unwrap_or_default(),
                    url,
                    source: meta.kind,
                    source_name: meta.name.clone(),
                    published_at: it
                        .pub_date
                        .as_deref()
                        .and_then(parse_rfc2822)
                        .unwrap_or(fetched_at),
                    summary: it.description,
                })
            })
            .collect::<Vec<_>>(),
        Err(rss_err) => {
            if !xml_clean.contains("<feed") {
                bail!("{} is not an RSS or Atom document: {rss_err}", meta.name);
            }
            let atom: AtomFeed = from_str(&xml_clean).map_err(|atom_err| {
                anyhow!("{} is neither RSS ({rss_err}) nor Atom ({atom_err})", meta.name)
            })?;
            atom.entry
                .into_iter()
                .take(meta.limit)
                .filter_map(|e| {
                    let url = e.article_link()?.trim().to_string();
                    if url.is_empty() {
                        return None;
                    }
                    let published_at = e
                        .published
                        .as_deref()
                        .or(e.updated.as_deref())
                        .and_then(parse_rfc3339)
                        .unwrap_or(fetched_at);
                    Some(RawItem {
                        title: e.title.map(|t| t.value).unwrap_or_default(),
                        url,
                        source: meta.kind,
                        source_name: meta.name.clone(),
                        published_at,
                        summary: e.summary.map(|s| s.value),
                    })
                })
                .collect()
        }
    };

    histogram!("digest_feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(out)
}

/// RSS/Atom source fetched over HTTP.
pub struct FeedProvider {
    meta: FeedMeta,
    url: String,
    client: reqwest::Client,
}

impl FeedProvider {
    pub fn new(meta: FeedMeta, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            meta,
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl SourceProvider for FeedProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        let body = match self.client.get(&self.url).send().await {
            Ok(resp) => resp
                .error_for_status()
                .with_context(|| format!("{} http status", self.meta.name))?
                .text()
                .await
                .with_context(|| format!("{} http .text()", self.meta.name))?,
            Err(e) => {
                counter!("digest_source_http_errors_total").increment(1);
                return Err(e).with_context(|| format!("{} http get()", self.meta.name));
            }
        };
        parse_feed(&body, &self.meta, Utc::now())
            .with_context(|| format!("parsing feed {}", self.url))
    }

    fn name(&self) -> &str {
        &self.meta.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn meta(limit: usize) -> FeedMeta {
        FeedMeta {
            name: "Test Feed".into(),
            kind: SourceKind::ResearchBlog,
            limit,
        }
    }

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Blog</title>
  <item>
    <title>Introducing GPT&nbsp;Next</title>
    <link>https://blog.test/gpt-next</link>
    <pubDate>Mon, 02 Jun 2025 10:00:00 +0000</pubDate>
    <description>&lt;p&gt;A new model&lt;/p&gt;</description>
  </item>
  <item>
    <title>No date here</title>
    <link>https://blog.test/no-date</link>
  </item>
  <item><title>No link</title></item>
</channel></rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>r/MachineLearning</title>
  <entry>
    <title type="html">[R] Agents that reason</title>
    <link rel="alternate" href="https://www.reddit.com/r/MachineLearning/comments/abc/"/>
    <updated>2025-06-02T08:30:00+00:00</updated>
    <summary>Discussion thread</summary>
  </entry>
</feed>"#;

    #[test]
    fn parses_rss_items_with_dates_and_fallbacks() {
        let fetched = Utc.with_ymd_and_hms(2025, 6, 3, 0, 0, 0).unwrap();
        let items = parse_feed(RSS, &meta(10), fetched).unwrap();
        assert_eq!(items.len(), 2, "item without link is skipped");
        assert_eq!(items[0].title, "Introducing GPT Next");
        assert_eq!(items[0].url, "https://blog.test/gpt-next");
        assert_eq!(
            items[0].published_at,
            Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap()
        );
        assert_eq!(items[0].summary.as_deref(), Some("<p>A new model</p>"));
        assert_eq!(items[1].published_at, fetched);
        assert!(items.iter().all(|i| i.source_name == "Test Feed"));
    }

    #[test]
    fn respects_limit() {
        let items = parse_feed(RSS, &meta(1), Utc::now()).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn parses_atom_entries() {
        let items = parse_feed(ATOM, &meta(10), Utc::now()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "[R] Agents that reason");
        assert_eq!(
            items[0].url,
            "https://www.reddit.com/r/MachineLearning/comments/abc/"
        );
        assert_eq!(
            items[0].published_at,
            Utc.with_ymd_and_hms(2025, 6, 2, 8, 30, 0).unwrap()
        );
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_feed("<html><body>oops", &meta(10), Utc::now()).is_err());
    }
}
