// src/telemetry.rs
//! Metric descriptions and the Prometheus text snapshot written after a run.

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::path::Path;

/// One-time metrics registration (so series show up in the snapshot).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "curator_raw_records_total",
            "Raw records parsed from feed providers."
        );
        describe_counter!(
            "curator_candidates_total",
            "Candidates admitted past normalization."
        );
        describe_counter!(
            "curator_session_dedup_total",
            "Candidates removed by session dedup."
        );
        describe_counter!(
            "curator_rejected_total",
            "Candidates rejected by the rule filter, by reason."
        );
        describe_counter!(
            "curator_provider_errors_total",
            "Feed provider fetch/parse errors."
        );
        describe_counter!("oracle_requests_total", "Oracle HTTP round-trips.");
        describe_counter!(
            "oracle_rate_limited_total",
            "Oracle responses with HTTP 429."
        );
        describe_counter!(
            "oracle_attempt_failures_total",
            "Oracle attempts that failed, by kind."
        );
        describe_counter!("enrich_failures_total", "Enrichment lookups that failed.");
        describe_counter!(
            "curator_backfill_total",
            "Shortlist slots filled by local fallback."
        );
        describe_counter!(
            "curator_pick_dropped_total",
            "Oracle picks dropped before backfill, by reason."
        );
        describe_counter!(
            "curator_recent_pruned_total",
            "Recent-seen records dropped for age."
        );
        describe_histogram!("oracle_request_ms", "Oracle request latency in milliseconds.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!("curator_last_run_ts", "Unix ts when curation last ran.");
    });
}

pub struct Telemetry {
    pub handle: PrometheusHandle,
}

impl Telemetry {
    /// Install the global Prometheus recorder. Fails if a recorder is already installed.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Write the exposition text atomically (textfile-collector style).
    pub fn write_snapshot(&self, path: &Path) -> Result<()> {
        crate::history::write_atomic(path, self.handle.render().as_bytes())
            .with_context(|| format!("writing metrics snapshot {}", path.display()))
    }
}
