// src/ingest/mod.rs
pub mod providers;
pub mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::SourceUnavailableError;
use crate::ingest::types::{RawItem, SourceProvider};

/// Clean a summary: strip tags, decode entities, fold quotes, collapse whitespace,
/// then cap at `max_chars` (a capped string ends with `...`).
///
/// Tags go before entities, so escaped markup such as `&lt;think&gt;` stays as text.
pub fn clean_text(s: &str, max_chars: usize) -> String {
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[a-z!][^>]*>").unwrap());
    let stripped = re_tags.replace_all(s, " ");
    clean_title(&stripped, max_chars)
}

/// Clean a title: decode entities, fold quotes, collapse whitespace, cap.
/// Angle brackets are text here; `Show HN: <Foo>` keeps its `<Foo>`.
pub fn clean_title(s: &str, max_chars: usize) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 3) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 4) Length cap
    if out.chars().count() > max_chars {
        let keep = max_chars.saturating_sub(3);
        out = out.chars().take(keep).collect::<String>().trim_end().to_string();
        out.push_str("...");
    }

    out
}

/// Everything gathered in one collection pass.
#[derive(Debug, Default)]
pub struct CollectOutcome {
    /// Items in source declaration order.
    pub items: Vec<RawItem>,
    pub failures: Vec<SourceUnavailableError>,
}

/// Fetch all providers concurrently, at most `concurrency` at a time, each bounded
/// by `timeout`. A failing source is logged and skipped; collection never fails.
pub async fn fetch_all(
    providers: &[Arc<dyn SourceProvider>],
    concurrency: usize,
    timeout: Duration,
) -> CollectOutcome {
    crate::metrics::ensure_metrics_described();

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set = JoinSet::new();

    for (idx, provider) in providers.iter().enumerate() {
        let provider = Arc::clone(provider);
        let sem = semaphore.clone();
        set.spawn(async move {
            let name = provider.name().to_string();
            let Ok(_permit) = sem.acquire().await else {
                return (
                    idx,
                    Err(SourceUnavailableError::Failed {
                        provider: name,
                        message: "worker pool closed".to_string(),
                    }),
                );
            };

            let t0 = Instant::now();
            let res = tokio::time::timeout(timeout, provider.fetch_latest()).await;
            histogram!("digest_source_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

            let res = match res {
                Ok(Ok(items)) => Ok(items),
                Ok(Err(e)) => Err(SourceUnavailableError::Failed {
                    provider: name,
                    message: format!("{e:#}"),
                }),
                Err(_) => Err(SourceUnavailableError::Timeout {
                    provider: name,
                    timeout,
                }),
            };
            (idx, res)
        });
    }

    let mut slots: Vec<Option<Result<Vec<RawItem>, SourceUnavailableError>>> =
        (0..providers.len()).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, res)) => slots[idx] = Some(res),
            Err(e) => {
                tracing::warn!(target: "collect", error = %e, "collector task aborted");
                counter!("digest_source_errors_total").increment(1);
            }
        }
    }

    let mut outcome = CollectOutcome::default();
    for slot in slots.into_iter().flatten() {
        match slot {
            Ok(mut items) => outcome.items.append(&mut items),
            Err(e) => {
                tracing::warn!(target: "collect", provider = e.provider(), error = %e, "source skipped");
                counter!("digest_source_errors_total").increment(1);
                outcome.failures.push(e);
            }
        }
    }

    counter!("digest_items_collected_total").increment(outcome.items.len() as u64);
    tracing::info!(
        target: "collect",
        sources = providers.len(),
        failed = outcome.failures.len(),
        items = outcome.items.len(),
        "collection finished"
    );
    outcome
}
