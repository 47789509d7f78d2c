// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod bootstrap;
pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod volume;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::error::{ClassifyError, EmptyResultWarning, FetchError, PipelineError, VolumeError};
pub use crate::pipeline::{Pipeline, RunRequest, TrendReport};

use axum::Router;

/// Full in-process app: config from the environment, pipeline, API routes and `/metrics`.
pub async fn app() -> anyhow::Result<Router> {
    let rt = bootstrap::TrendRuntime::from_env()?;
    let state = api::AppState::new(rt.pipeline.clone(), rt.cfg.region.clone(), rt.cfg.period);
    let metrics = crate::metrics::Metrics::init()?;
    Ok(api::router(state).merge(metrics.router()))
}
