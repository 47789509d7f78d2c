use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::error::PipelineError;
use crate::ingest::is_valid_region;
use crate::ingest::types::TimePeriod;
use crate::pipeline::{Pipeline, RunRequest};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    region: String,
    period: TimePeriod,
}

impl AppState {
    /// `region` and `period` apply when a request leaves them out.
    pub fn new(pipeline: Arc<Pipeline>, region: impl Into<String>, period: TimePeriod) -> Self {
        Self {
            pipeline,
            region: region.into(),
            period,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/categories", get(categories))
        .route("/trends", get(trends))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Default, serde::Deserialize)]
struct TrendsQuery {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    period: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

fn error_body(status: StatusCode, stage: &str, error: String) -> Response {
    (status, Json(json!({ "stage": stage, "error": error }))).into_response()
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        error_body(StatusCode::BAD_GATEWAY, self.stage(), self.to_string())
    }
}

async fn categories(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.pipeline.taxonomy().names().to_vec())
}

async fn trends(State(state): State<AppState>, Query(q): Query<TrendsQuery>) -> Response {
    let period = match q.period.as_deref().filter(|p| !p.trim().is_empty()) {
        None => state.period,
        Some(p) => match p.parse::<TimePeriod>() {
            Ok(v) => v,
            Err(e) => return error_body(StatusCode::BAD_REQUEST, "request", e.to_string()),
        },
    };
    let region = q
        .region
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| state.region.clone());
    if !is_valid_region(&region) {
        return error_body(
            StatusCode::BAD_REQUEST,
            "request",
            format!("invalid region {region:?}"),
        );
    }

    let mut req = RunRequest::new(region).period(period);
    if let Some(c) = q.category.filter(|c| !c.trim().is_empty()) {
        req = req.category(c);
    }

    match state.pipeline.run(&req).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => e.into_response(),
    }
}
