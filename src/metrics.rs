use std::path::Path;

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const ENV_METRICS_TEXTFILE: &str = "METRICS_TEXTFILE";

/// One-time metrics registration (so series show up in the exposition).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "digest_items_collected_total",
            "Raw items returned by all sources."
        );
        describe_counter!(
            "digest_items_malformed_total",
            "Items dropped because their link could not be normalized."
        );
        describe_counter!(
            "digest_items_below_threshold_total",
            "Items scoring under the minimum score."
        );
        describe_counter!(
            "digest_items_duplicate_total",
            "Items already delivered or repeated within a run."
        );
        describe_counter!(
            "digest_items_capped_total",
            "Items cut by the per-digest item cap."
        );
        describe_counter!("digest_messages_sent_total", "Digest messages delivered.");
        describe_counter!(
            "digest_messages_failed_total",
            "Digest messages the transport did not confirm."
        );
        describe_counter!(
            "digest_items_committed_total",
            "Identity keys recorded in the sent store."
        );
        describe_counter!("digest_source_errors_total", "Source fetch/parse failures.");
        describe_counter!(
            "digest_source_http_errors_total",
            "Transport-level failures while fetching a feed."
        );
        describe_counter!("digest_store_errors_total", "Sent store read/write failures.");
        describe_histogram!("digest_source_fetch_ms", "Per-source fetch time in milliseconds.");
        describe_histogram!("digest_feed_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!("digest_last_run_ts", "Unix ts when the digest pipeline last ran.");
    });
}

/// Process-wide Prometheus recorder. The run is a one-shot job, so the
/// exposition is written to a textfile at exit instead of served.
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    pub fn mark_run(&self) {
        gauge!("digest_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Write the exposition atomically (tmp + rename) for a node-exporter textfile collector.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating metrics dir {}", dir.display()))?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        std::fs::write(&tmp, self.render())
            .with_context(|| format!("writing metrics to {}", path.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("moving metrics into {}", path.display()))?;
        Ok(())
    }
}
