// src/volume/mod.rs
//! # Volume Analyzer
//! Week-over-week change per term from one interest-over-time query.
//!
//! Only the boundary samples matter: `start` is the first row, `end` the last.
//! A zero baseline is replaced by 1 so the change is always defined.

pub mod interest;

use std::sync::Arc;

use serde::Serialize;

use crate::error::VolumeError;
use crate::volume::interest::{InterestError, InterestSeries, InterestService, Timeframe};

/// Above this percentage a term is Rising.
pub const RISING_ABOVE_PCT: f64 = 20.0;
/// Below this percentage a term is Falling.
pub const FALLING_BELOW_PCT: f64 = -10.0;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum TrendStatus {
    Rising,
    Falling,
    Stable,
}

impl TrendStatus {
    /// Boundary values fall to Stable.
    pub fn from_change(pct: f64) -> Self {
        if pct > RISING_ABOVE_PCT {
            TrendStatus::Rising
        } else if pct < FALLING_BELOW_PCT {
            TrendStatus::Falling
        } else {
            TrendStatus::Stable
        }
    }
}

pub fn percent_change(start: f64, end: f64) -> f64 {
    let base = if start != 0.0 { start } else { 1.0 };
    (end - start) / base * 100.0
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrendSummary {
    pub term: String,
    pub start_value: f64,
    pub end_value: f64,
    pub percent_change: f64,
    pub status: TrendStatus,
}

impl TrendSummary {
    pub fn from_bounds(term: impl Into<String>, start: f64, end: f64) -> Self {
        let pct = percent_change(start, end);
        Self {
            term: term.into(),
            start_value: start,
            end_value: end,
            percent_change: pct,
            status: TrendStatus::from_change(pct),
        }
    }

    pub fn from_series(series: &InterestSeries) -> Option<Self> {
        let first = series.points.first()?;
        let last = series.points.last()?;
        Some(Self::from_bounds(series.term.clone(), first.1, last.1))
    }
}

/// Descending by change; equal changes keep their order.
pub fn sort_top_movers(summaries: &mut [TrendSummary]) {
    summaries.sort_by(|a, b| b.percent_change.total_cmp(&a.percent_change));
}

pub struct VolumeAnalyzer {
    service: Arc<dyn InterestService>,
    geo: String,
}

impl VolumeAnalyzer {
    pub fn new(service: Arc<dyn InterestService>, geo: impl Into<String>) -> Self {
        Self {
            service,
            geo: geo.into(),
        }
    }

    pub async fn analyze(
        &self,
        terms: &[String],
        window: Timeframe,
    ) -> Result<Vec<TrendSummary>, VolumeError> {
        self.analyze_in(terms, window, &self.geo).await
    }

    /// One batched query for all `terms` in `geo`. An empty or malformed batch
    /// yields an empty result; only transport failures are errors.
    pub async fn analyze_in(
        &self,
        terms: &[String],
        window: Timeframe,
        geo: &str,
    ) -> Result<Vec<TrendSummary>, VolumeError> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let table = match self
            .service
            .interest_over_time(terms, window, geo)
            .await
        {
            Ok(t) => t,
            Err(InterestError::Malformed(m)) => {
                tracing::warn!(service = self.service.name(), reason = %m, "interest series malformed, no summaries");
                return Ok(Vec::new());
            }
            Err(e @ InterestError::Transport(_)) => {
                return Err(VolumeError {
                    message: e.to_string(),
                })
            }
        };

        let mut out: Vec<TrendSummary> = table
            .into_series(terms)
            .iter()
            .filter_map(TrendSummary::from_series)
            .collect();
        sort_top_movers(&mut out);

        tracing::info!(
            target: "volume",
            service = self.service.name(),
            geo,
            window = window.as_query(),
            terms = terms.len(),
            summaries = out.len(),
            "interest analysis done"
        );
        Ok(out)
    }
}
