// src/pipeline.rs
//! Source -> Classifier -> Volume, one strictly sequential run per request.

use chrono::{DateTime, Utc};
use metrics::{gauge, histogram};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::classify::{Bucket, CategoryTaxonomy, Classifier};
use crate::error::{EmptyResultWarning, PipelineError};
use crate::ingest::types::{SourceKind, TimePeriod, TrendItem, TrendSource};
use crate::ingest::{
    fetch_trending_terms, filter_time_period, top_by_traffic, unique_topics, TrafficRank,
};
use crate::volume::interest::Timeframe;
use crate::volume::{TrendSummary, VolumeAnalyzer};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RunRequest {
    pub region: String,
    #[serde(default)]
    pub period: TimePeriod,
    /// Restrict the report to one taxonomy category.
    #[serde(default)]
    pub category: Option<String>,
}

impl RunRequest {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            period: TimePeriod::default(),
            category: None,
        }
    }

    pub fn period(mut self, period: TimePeriod) -> Self {
        self.period = period;
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendReport {
    pub region: String,
    pub source: SourceKind,
    pub period: TimePeriod,
    pub generated_at: DateTime<Utc>,
    /// Items whose topic was classified (and matched the category filter).
    pub items: Vec<TrendItem>,
    pub buckets: Vec<Bucket>,
    pub top_traffic: Vec<TrafficRank>,
    /// Descending by percent change.
    pub summaries: Vec<TrendSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<EmptyResultWarning>,
}

impl TrendReport {
    fn empty(req: &RunRequest, source: SourceKind, now: DateTime<Utc>) -> Self {
        Self {
            region: req.region.clone(),
            source,
            period: req.period,
            generated_at: now,
            items: Vec::new(),
            buckets: Vec::new(),
            top_traffic: Vec::new(),
            summaries: Vec::new(),
            warning: None,
        }
    }

    fn warn(mut self, w: EmptyResultWarning) -> Self {
        tracing::info!(target: "pipeline", region = %self.region, warning = ?w, "{}", w.message());
        self.warning = Some(w);
        self
    }
}

pub struct Pipeline {
    source: Box<dyn TrendSource>,
    classifier: Classifier,
    taxonomy: CategoryTaxonomy,
    volume: Option<VolumeAnalyzer>,
    timeframe: Timeframe,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn TrendSource>,
        classifier: Classifier,
        taxonomy: CategoryTaxonomy,
    ) -> Self {
        Self {
            source,
            classifier,
            taxonomy,
            volume: None,
            timeframe: Timeframe::default(),
        }
    }

    pub fn with_volume(mut self, analyzer: VolumeAnalyzer, timeframe: Timeframe) -> Self {
        self.volume = Some(analyzer);
        self.timeframe = timeframe;
        self
    }

    pub fn taxonomy(&self) -> &CategoryTaxonomy {
        &self.taxonomy
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub async fn run(&self, req: &RunRequest) -> Result<TrendReport, PipelineError> {
        self.run_at(req, Utc::now()).await
    }

    /// Same as [`Pipeline::run`] with an explicit clock for the period filter.
    pub async fn run_at(
        &self,
        req: &RunRequest,
        now: DateTime<Utc>,
    ) -> Result<TrendReport, PipelineError> {
        let started = Instant::now();
        let res = self.run_stages(req, now).await;
        histogram!("pipeline_run_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        match &res {
            Ok(_) => gauge!("pipeline_last_run_ts").set(now.timestamp() as f64),
            Err(e) => tracing::warn!(
                target: "pipeline",
                stage = e.stage(),
                error = %e,
                region = %req.region,
                "pipeline run failed"
            ),
        }
        res
    }

    async fn run_stages(
        &self,
        req: &RunRequest,
        now: DateTime<Utc>,
    ) -> Result<TrendReport, PipelineError> {
        let report = TrendReport::empty(req, self.source.kind(), now);

        let items = fetch_trending_terms(self.source.as_ref(), &req.region).await?;
        let items = filter_time_period(items, req.period, now);
        if items.is_empty() {
            return Ok(report.warn(EmptyResultWarning::NoTrends));
        }

        let topics = unique_topics(&items);
        let result = self.classifier.classify(&topics, &self.taxonomy).await?;

        // Unknown category filter simply matches nothing.
        let wanted: Option<Option<&str>> = req
            .category
            .as_deref()
            .map(|c| self.taxonomy.canonical(c.trim()));

        let buckets: Vec<Bucket> = result
            .buckets()
            .into_iter()
            .filter(|b| match wanted {
                None => true,
                Some(w) => w == Some(b.category.as_str()),
            })
            .collect();

        let kept: Vec<TrendItem> = items
            .into_iter()
            .filter(|it| {
                buckets
                    .iter()
                    .any(|b| b.terms.iter().any(|t| *t == it.topic))
            })
            .collect();

        let mut report = TrendReport {
            buckets,
            top_traffic: top_by_traffic(&kept),
            ..report
        };
        if kept.is_empty() {
            return Ok(report.warn(EmptyResultWarning::NoClassifiedTerms));
        }
        let terms = unique_topics(&kept);
        let mut kept = kept;
        // Newest first, undated last; ties keep fetch order.
        kept.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        report.items = kept;

        let Some(volume) = &self.volume else {
            return Ok(report);
        };
        let summaries = volume
            .analyze_in(&terms, self.timeframe, &req.region)
            .await?;

        tracing::info!(
            target: "pipeline",
            region = %req.region,
            terms = terms.len(),
            summaries = summaries.len(),
            "pipeline run done"
        );

        if summaries.is_empty() {
            return Ok(report.warn(EmptyResultWarning::NoInterestData));
        }
        report.summaries = summaries;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::oracle::StaticOracle;
    use crate::classify::ClassifyMode;
    use crate::ingest::providers::rss::RssTrendSource;
    use std::sync::Arc;

    const XML: &str = r#"<rss><channel>
<item><title>Rust 2.0</title><pubDate>Mon, 13 Oct 2025 08:00:00 GMT</pubDate></item>
<item><title>Cup final</title><pubDate>Mon, 13 Oct 2025 09:00:00 GMT</pubDate></item>
</channel></rss>"#;

    fn pipeline(reply: &str) -> Pipeline {
        let tax = CategoryTaxonomy::new(["Tech", "Sports"]).unwrap();
        let classifier = Classifier::new(Arc::new(StaticOracle::new(reply)), ClassifyMode::Bulk);
        Pipeline::new(
            Box::new(RssTrendSource::from_fixture("daily", XML)),
            classifier,
            tax,
        )
    }

    fn now() -> DateTime<Utc> {
        "2025-10-13T12:00:00Z".parse().unwrap()
    }

    #[tokio::test]
    async fn category_filter_keeps_one_bucket() {
        let p = pipeline(r#"{"Tech":["Rust 2.0"],"Sports":["Cup final"]}"#);
        let report = p
            .run_at(&RunRequest::new("US").category("sports"), now())
            .await
            .unwrap();
        assert_eq!(report.buckets.len(), 1);
        assert_eq!(report.buckets[0].category, "Sports");
        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].topic, "Cup final");
        assert!(report.warning.is_none());
    }

    #[tokio::test]
    async fn unknown_category_warns_no_classified_terms() {
        let p = pipeline(r#"{"Tech":["Rust 2.0"]}"#);
        let report = p
            .run_at(&RunRequest::new("US").category("Weather"), now())
            .await
            .unwrap();
        assert_eq!(report.warning, Some(EmptyResultWarning::NoClassifiedTerms));
        assert!(report.items.is_empty());
    }

    #[tokio::test]
    async fn items_are_newest_first_with_undated_last() {
        let xml = r#"<rss><channel>
<item><title>Rust 2.0</title><pubDate>Mon, 13 Oct 2025 08:00:00 GMT</pubDate></item>
<item><title>Rust fmt</title></item>
<item><title>Cup final</title><pubDate>Mon, 13 Oct 2025 09:00:00 GMT</pubDate></item>
<item><title>Rust book</title></item>
<item><title>Derby</title><pubDate>Mon, 13 Oct 2025 07:00:00 GMT</pubDate></item>
</channel></rss>"#;
        let tax = CategoryTaxonomy::new(["Tech", "Sports"]).unwrap();
        let oracle = StaticOracle::new(
            r#"{"Tech":["Rust 2.0","Rust fmt","Rust book"],"Sports":["Cup final","Derby"]}"#,
        );
        let p = Pipeline::new(
            Box::new(RssTrendSource::from_fixture("daily", xml)),
            Classifier::new(Arc::new(oracle), ClassifyMode::Bulk),
            tax,
        );
        let report = p.run_at(&RunRequest::new("US"), now()).await.unwrap();
        let topics: Vec<&str> = report.items.iter().map(|i| i.topic.as_str()).collect();
        assert_eq!(
            topics,
            vec!["Cup final", "Rust 2.0", "Derby", "Rust fmt", "Rust book"]
        );
    }

    #[tokio::test]
    async fn period_filter_can_empty_the_run() {
        let p = pipeline("{}");
        let later: DateTime<Utc> = "2025-10-20T12:00:00Z".parse().unwrap();
        let report = p
            .run_at(&RunRequest::new("US").period(TimePeriod::Last24h), later)
            .await
            .unwrap();
        assert_eq!(report.warning, Some(EmptyResultWarning::NoTrends));
    }
}
