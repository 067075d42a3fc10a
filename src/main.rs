//! AI News Digest: one-shot binary entrypoint.
//! Collects, ranks and renders the digest, delivers it to Telegram and
//! records what went out. Periodic triggering is left to cron/systemd.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ai_news_digest::config::DigestConfig;
use ai_news_digest::error::StoreError;
use ai_news_digest::ingest::{self, providers};
use ai_news_digest::metrics::{Metrics, ENV_METRICS_TEXTFILE};
use ai_news_digest::notify::telegram::ENV_CHANNEL_ID;
use ai_news_digest::notify::TelegramNotifier;
use ai_news_digest::pipeline::DigestPipeline;
use ai_news_digest::store::{JsonFileStore, RunLock, SentStore, UnavailableStore};

const ENV_DRY_RUN: &str = "DIGEST_DRY_RUN";
const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ai_news_digest=info,warn"));

    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

fn dry_run() -> bool {
    std::env::var(ENV_DRY_RUN).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

async fn open_store(cfg: &DigestConfig) -> Box<dyn SentStore> {
    match JsonFileStore::open(cfg.store.path.clone()).await {
        Ok(store) => {
            tracing::info!(target: "store", path = %store.path().display(), known = store.len(), "sent store opened");
            Box::new(store)
        }
        Err(e) => {
            tracing::warn!(target: "store", error = %e, "sent store unavailable, continuing without dedup history");
            Box::new(UnavailableStore::new(e))
        }
    }
}

async fn run() -> Result<ExitCode> {
    let metrics = Metrics::init()?;
    let cfg = DigestConfig::load_default().context("loading digest config")?;

    // Single writer: refuse to run next to another instance.
    let _lock = match RunLock::acquire(&cfg.store.lock_path(), cfg.store.lock_stale()) {
        Ok(lock) => Some(lock),
        Err(e @ StoreError::Locked { .. }) => return Err(e).context("another digest run is active"),
        Err(e) => {
            tracing::warn!(target: "store", error = %e, "could not take run lock, continuing unlocked");
            None
        }
    };

    let store = open_store(&cfg).await;

    let sources = providers::build_providers(&cfg.sources, &cfg.collect)?;
    let collected = ingest::fetch_all(&sources, cfg.collect.concurrency, cfg.collect.timeout()).await;

    let channel = if cfg.digest.channel.trim().is_empty() {
        std::env::var(ENV_CHANNEL_ID).unwrap_or_default()
    } else {
        cfg.digest.channel.clone()
    };
    let pipeline = DigestPipeline::from_config(&cfg, &channel)?;
    let generated_at = Utc::now().with_timezone(&cfg.utc_offset());

    let exit = if dry_run() {
        let prepared = pipeline.prepare(collected.items, store.as_ref(), generated_at).await;
        for msg in &prepared.messages {
            tracing::info!(target: "digest", part = msg.part, items = msg.items.len(), "dry run, not sent");
            println!("{}\n", msg.text);
        }
        ExitCode::SUCCESS
    } else {
        let notifier = TelegramNotifier::from_env()?;
        let report = pipeline
            .run(collected.items, store.as_ref(), &notifier, generated_at)
            .await;
        if report.total_delivery_failure() {
            tracing::error!(
                target: "digest",
                total = report.messages_total,
                error = ?report.delivery_error,
                "no digest message could be delivered"
            );
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    };

    metrics.mark_run();
    if let Ok(p) = std::env::var(ENV_METRICS_TEXTFILE) {
        if let Err(e) = metrics.write_textfile(&PathBuf::from(p)) {
            tracing::warn!(error = %format!("{e:#}"), "metrics textfile not written");
        }
    }
    Ok(exit)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "digest run aborted");
            ExitCode::FAILURE
        }
    }
}
