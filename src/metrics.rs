use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and describe the
    /// classification, volume and pipeline series.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        describe_counter!(
            "classify_oracle_calls_total",
            "Requests sent to the classification oracle."
        );
        describe_counter!(
            "classify_oracle_errors_total",
            "Oracle requests that failed or returned an unusable body."
        );
        describe_counter!(
            "classify_cache_hits_total",
            "Terms answered from the classification cache."
        );
        describe_counter!(
            "volume_queries_total",
            "Interest-over-time queries sent upstream."
        );
        describe_histogram!("pipeline_run_ms", "Pipeline run time in milliseconds.");
        describe_gauge!(
            "pipeline_last_run_ts",
            "Unix ts of the last successful pipeline run."
        );

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
