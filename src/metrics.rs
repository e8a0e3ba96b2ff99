use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder. Call once, from the binary.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_ingest_metrics();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// Descriptions so series show up on /metrics with help text.
pub fn describe_ingest_metrics() {
    describe_counter!("ingest_batches_total", "Ingest batches completed.");
    describe_counter!("ingest_articles_total", "Articles returned by the news provider.");
    describe_counter!("ingest_saved_total", "New sightings stored.");
    describe_counter!("ingest_skipped_total", "Articles skipped, by reason.");
    describe_counter!("ingest_provider_errors_total", "Failed provider calls, by provider.");
    describe_counter!(
        "ingest_ticks_skipped_total",
        "Scheduler ticks skipped because a batch was running."
    );
    describe_histogram!("ingest_batch_duration_ms", "Batch wall time in milliseconds.");
    describe_histogram!("ingest_parse_ms", "News response parse time in milliseconds.");
    describe_gauge!("ingest_last_run_ts", "Unix ts when the last batch finished.");
}
