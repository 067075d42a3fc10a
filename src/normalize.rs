//! # Normalizer
//!
//! Turns collector output into [`NewsItem`]s: cleans title and summary and
//! derives the [`IdentityKey`] used for cross-run duplicate detection.
//!
//! Key shape: `scheme://host[:port]/path[?sorted-params]`, all lowercase except
//! query values, trailing slash and fragment dropped, tracking parameters removed.

use std::fmt;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::categorize::Category;
use crate::error::MalformedItemError;
use crate::ingest::{clean_text, clean_title};
use crate::ingest::types::{RawItem, SourceKind};

pub const TITLE_MAX_CHARS: usize = 300;
pub const SUMMARY_MAX_CHARS: usize = 200;

const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "msclkid", "mc_cid", "mc_eid", "igshid", "ref", "ref_src",
    "ref_url", "_hsenc", "_hsmi", "yclid",
];

fn is_tracking_param(name: &str) -> bool {
    let n = name.to_ascii_lowercase();
    n.starts_with("utm_") || TRACKING_PARAMS.contains(&n.as_str())
}

/// Canonical form of an item link. Equal keys mean "same article".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn from_url(link: &str) -> Result<Self, MalformedItemError> {
        let trimmed = link.trim();
        if trimmed.is_empty() {
            return Err(MalformedItemError::new(link, "empty link"));
        }
        let url = Url::parse(trimmed).map_err(|e| MalformedItemError::new(link, e.to_string()))?;

        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(MalformedItemError::new(
                link,
                format!("unsupported scheme {scheme:?}"),
            ));
        }
        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h.to_ascii_lowercase(),
            _ => return Err(MalformedItemError::new(link, "missing host")),
        };

        let mut key = format!("{scheme}://{host}");
        if let Some(port) = url.port() {
            let _ = write!(key, ":{port}");
        }
        let path = url.path().to_lowercase();
        key.push_str(path.trim_end_matches('/'));

        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !is_tracking_param(k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if !params.is_empty() {
            params.sort();
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params)
                .finish();
            key.push('?');
            key.push_str(&query);
        }

        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalized item flowing through one run of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub summary: Option<String>,
    pub source: SourceKind,
    pub source_name: String,
    pub published_at: DateTime<Utc>,
    pub identity_key: IdentityKey,
    /// Sum of matched keyword weights; 0 until scored.
    pub score: i32,
    /// Assigned by the categorizer.
    pub category: Option<Category>,
}

pub fn normalize_item(raw: RawItem) -> Result<NewsItem, MalformedItemError> {
    let identity_key = IdentityKey::from_url(&raw.url)?;

    let mut title = clean_title(&raw.title, TITLE_MAX_CHARS);
    if title.is_empty() {
        title = "Untitled".to_string();
    }
    let summary = raw
        .summary
        .as_deref()
        .map(|s| clean_text(s, SUMMARY_MAX_CHARS))
        .filter(|s| !s.is_empty());

    Ok(NewsItem {
        title,
        url: raw.url.trim().to_string(),
        summary,
        source: raw.source,
        source_name: raw.source_name,
        published_at: raw.published_at,
        identity_key,
        score: 0,
        category: None,
    })
}

/// Normalize a batch. Malformed items are dropped and returned separately.
pub fn normalize_all(raw: Vec<RawItem>) -> (Vec<NewsItem>, Vec<MalformedItemError>) {
    let mut items = Vec::with_capacity(raw.len());
    let mut malformed = Vec::new();
    for r in raw {
        match normalize_item(r) {
            Ok(item) => items.push(item),
            Err(e) => {
                tracing::debug!(target: "digest", error = %e, "dropping malformed item");
                malformed.push(e);
            }
        }
    }
    if !malformed.is_empty() {
        tracing::warn!(target: "digest", count = malformed.len(), "malformed items dropped");
        counter!("digest_items_malformed_total").increment(malformed.len() as u64);
    }
    (items, malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> String {
        IdentityKey::from_url(s).unwrap().as_str().to_string()
    }

    #[test]
    fn same_article_variants_share_a_key() {
        let canonical = key("https://openai.com/blog/new-model");
        for variant in [
            "https://openai.com/blog/new-model/",
            "HTTPS://OpenAI.com/Blog/New-Model",
            "https://openai.com/blog/new-model?utm_source=rss&utm_medium=feed",
            "https://openai.com/blog/new-model#comments",
            "https://openai.com:443/blog/new-model?fbclid=abc",
            "  https://openai.com/blog/new-model  ",
        ] {
            assert_eq!(key(variant), canonical, "variant {variant}");
        }
        assert_eq!(canonical, "https://openai.com/blog/new-model");
    }

    #[test]
    fn meaningful_query_params_are_kept_sorted() {
        assert_eq!(
            key("https://news.ycombinator.com/item?id=42&utm_campaign=x"),
            "https://news.ycombinator.com/item?id=42"
        );
        assert_eq!(key("https://a.test/p?b=2&a=1"), key("https://a.test/p?a=1&b=2"));
        assert_ne!(key("https://a.test/p?id=1"), key("https://a.test/p?id=2"));
    }

    #[test]
    fn root_path_and_port_are_canonical() {
        assert_eq!(key("https://example.com/"), "https://example.com");
        assert_eq!(key("http://example.com:8080/x/"), "http://example.com:8080/x");
    }

    #[test]
    fn unusable_links_are_malformed() {
        for bad in ["", "not a url", "/relative/path", "mailto:a@b.c", "ftp://host/file"] {
            assert!(IdentityKey::from_url(bad).is_err(), "{bad:?} should be malformed");
        }
    }

    #[test]
    fn normalize_all_separates_malformed() {
        let now = Utc::now();
        let raw = vec![
            RawItem {
                title: "GPT-5 &amp; <friends>".into(),
                url: "https://x.test/a".into(),
                source: SourceKind::ResearchBlog,
                source_name: "X".into(),
                published_at: now,
                summary: Some("   ".into()),
            },
            RawItem {
                title: "broken".into(),
                url: "::::".into(),
                source: SourceKind::Community,
                source_name: "Y".into(),
                published_at: now,
                summary: None,
            },
        ];
        let (items, malformed) = normalize_all(raw);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "GPT-5 & <friends>");
        assert_eq!(items[0].summary, None);
        assert_eq!(malformed.len(), 1);
    }

    #[test]
    fn title_brackets_survive_while_summary_markup_goes() {
        let item = normalize_item(RawItem {
            title: "Show HN: <Foo> – a GPT wrapper".into(),
            url: "https://news.ycombinator.com/item?id=1".into(),
            source: SourceKind::Community,
            source_name: "Hacker News".into(),
            published_at: Utc::now(),
            summary: Some("<p>Built on <code>gpt-4o</code></p>".into()),
        })
        .unwrap();
        assert_eq!(item.title, "Show HN: <Foo> – a GPT wrapper");
        assert_eq!(item.summary.as_deref(), Some("Built on gpt-4o"));
    }
}
