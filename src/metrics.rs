// src/metrics.rs
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Only the first call per process succeeds.
    pub fn init(cache_hours: u64) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        describe_news_metrics();
        // static gauge with the configured retention
        gauge!("news_cache_retention_hours").set(cache_hours as f64);

        Ok(Self { handle })
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
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

/// Register help text for every series. Idempotent.
pub fn describe_news_metrics() {
    static DONE: OnceCell<()> = OnceCell::new();
    DONE.get_or_init(|| {
        describe_counter!("news_feed_errors_total", "Feeds that failed to fetch or parse");
        describe_counter!("news_articles_fetched_total", "Articles parsed from feeds");
        describe_counter!("news_articles_selected_total", "Articles selected for delivery");
        describe_counter!("news_duplicates_total", "Matched articles dropped as already seen");
        describe_counter!("news_unmatched_total", "Articles matching no keyword");
        describe_histogram!("news_fetch_ms", Unit::Milliseconds, "Successful feed fetch latency");
        describe_gauge!("news_cache_entries", "Identities held by the dedup cache");
        describe_gauge!("news_last_run_ts", Unit::Seconds, "Unix time of the last run");
        describe_gauge!("news_cache_retention_hours", "Dedup retention window");
        describe_counter!("news_deliveries_total", "Articles accepted by a sink");
        describe_counter!("news_delivery_failures_total", "Messages a sink rejected");
    });
}
