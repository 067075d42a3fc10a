pub mod feed;
pub mod github_trending;
pub mod hacker_news;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::{CollectSection, SourceSpec};
use crate::ingest::types::SourceProvider;

pub use feed::{FeedMeta, FeedProvider};
pub use github_trending::GithubTrendingProvider;
pub use hacker_news::HackerNewsProvider;

/// Shared HTTP client for all collectors.
pub fn http_client(collect: &CollectSection) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(collect.user_agent.clone())
        .timeout(collect.timeout())
        .build()
        .context("building collector http client")
}

/// One provider per configured source, in declaration order.
pub fn build_providers(
    sources: &[SourceSpec],
    collect: &CollectSection,
) -> Result<Vec<Arc<dyn SourceProvider>>> {
    let client = http_client(collect)?;
    let providers = sources
        .iter()
        .map(|spec| -> Arc<dyn SourceProvider> {
            match spec {
                SourceSpec::Rss {
                    name,
                    url,
                    kind,
                    limit,
                    ..
                } => Arc::new(FeedProvider::new(
                    FeedMeta {
                        name: name.clone(),
                        kind: *kind,
                        limit: *limit,
                    },
                    url.clone(),
                    client.clone(),
                )),
                SourceSpec::HackerNews { limit, .. } => {
                    Arc::new(HackerNewsProvider::new(*limit, client.clone()))
                }
                SourceSpec::GithubTrending { topic, limit, .. } => Arc::new(
                    GithubTrendingProvider::new(spec.display_name(), topic, *limit, client.clone()),
                ),
            }
        })
        .collect();
    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::SourceKind;

    #[test]
    fn builds_one_provider_per_source_in_order() {
        let sources = vec![
            SourceSpec::Rss {
                name: "Blog".into(),
                url: "https://blog.test/feed".into(),
                kind: SourceKind::ResearchBlog,
                limit: 5,
                emoji: None,
            },
            SourceSpec::HackerNews {
                limit: 3,
                emoji: None,
            },
            SourceSpec::GithubTrending {
                topic: "python".into(),
                limit: 5,
                emoji: Some("🐍".into()),
            },
        ];
        let providers = build_providers(&sources, &CollectSection::default()).unwrap();
        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, ["Blog", "Hacker News", "GitHub Trending (python)"]);
    }
}
