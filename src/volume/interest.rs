// src/volume/interest.rs
//! Interest-over-time service boundary and the Google Trends implementation
//! (`explore` for a widget token, then `widgetdata/multiline` for the series).

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};

pub const DEFAULT_GOOGLE_TRENDS_BASE: &str = "https://trends.google.com/trends";

/// Upstream accepts at most this many keywords per comparison.
const MAX_TERMS_PER_QUERY: usize = 5;

/// Lookback window for the interest query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Timeframe {
    #[serde(rename = "1d")]
    Day,
    #[default]
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "1m")]
    Month,
    #[serde(rename = "3m")]
    Quarter,
    #[serde(rename = "12m")]
    Year,
}

impl Timeframe {
    /// Value of the upstream `time` field.
    pub fn as_query(self) -> &'static str {
        match self {
            Timeframe::Day => "now 1-d",
            Timeframe::Week => "now 7-d",
            Timeframe::Month => "today 1-m",
            Timeframe::Quarter => "today 3-m",
            Timeframe::Year => "today 12-m",
        }
    }
}

/// One sample row: a value per term plus the upstream partial-data flag.
#[derive(Debug, Clone, PartialEq)]
pub struct InterestRow {
    pub time: DateTime<Utc>,
    pub values: HashMap<String, f64>,
    pub is_partial: bool,
}

/// Rows keyed by time; one column per queried term.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterestTable {
    rows: BTreeMap<DateTime<Utc>, InterestRow>,
}

impl InterestTable {
    pub fn from_rows(rows: Vec<InterestRow>) -> Self {
        let mut t = Self::default();
        for r in rows {
            t.push(r);
        }
        t
    }

    /// Rows at the same timestamp merge their columns.
    pub fn push(&mut self, row: InterestRow) {
        match self.rows.get_mut(&row.time) {
            Some(cur) => {
                cur.values.extend(row.values);
                cur.is_partial |= row.is_partial;
            }
            None => {
                self.rows.insert(row.time, row);
            }
        }
    }

    pub fn merge(&mut self, other: InterestTable) {
        for (_, r) in other.rows {
            self.push(r);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One series per term (in `terms` order) with the partial flag stripped.
    /// Terms without a single sample are left out.
    pub fn into_series(self, terms: &[String]) -> Vec<InterestSeries> {
        terms
            .iter()
            .filter_map(|term| {
                let points: Vec<(DateTime<Utc>, f64)> = self
                    .rows
                    .values()
                    .filter_map(|r| r.values.get(term).map(|v| (r.time, *v)))
                    .collect();
                (!points.is_empty()).then(|| InterestSeries {
                    term: term.clone(),
                    points,
                })
            })
            .collect()
    }
}

/// Ordered (timestamp, relative score) samples for one term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterestSeries {
    pub term: String,
    pub points: Vec<(DateTime<Utc>, f64)>,
}

#[derive(Debug)]
pub enum InterestError {
    /// Could not reach the service or it refused the request.
    Transport(anyhow::Error),
    /// Service answered but the payload is not a usable series.
    Malformed(String),
}

impl fmt::Display for InterestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterestError::Transport(e) => write!(f, "transport: {e:#}"),
            InterestError::Malformed(m) => write!(f, "malformed series: {m}"),
        }
    }
}

impl std::error::Error for InterestError {}

#[async_trait]
pub trait InterestService: Send + Sync {
    async fn interest_over_time(
        &self,
        terms: &[String],
        timeframe: Timeframe,
        geo: &str,
    ) -> Result<InterestTable, InterestError>;
    fn name(&self) -> &'static str;
}

// ------------------------------------------------------------
// Google Trends
// ------------------------------------------------------------

pub struct GoogleTrendsInterest {
    http: reqwest::Client,
    base: String,
}

#[derive(Debug, Deserialize)]
struct ExploreResp {
    #[serde(default)]
    widgets: Vec<Widget>,
}
#[derive(Debug, Deserialize)]
struct Widget {
    id: String,
    #[serde(default)]
    token: String,
    #[serde(default)]
    request: serde_json::Value,
}
#[derive(Debug, Deserialize)]
struct MultilineResp {
    default: MultilineDefault,
}
#[derive(Debug, Deserialize)]
struct MultilineDefault {
    #[serde(rename = "timelineData", default)]
    timeline_data: Vec<TimelinePoint>,
}
#[derive(Debug, Deserialize)]
struct TimelinePoint {
    time: String, // unix seconds as a string
    value: Vec<f64>,
    #[serde(rename = "isPartial", default)]
    is_partial: bool,
}

/// Strip the anti-JSON-hijacking prefix (`)]}'` / `)]}',`).
fn strip_xssi(body: &str) -> &str {
    match body.find(['{', '[']) {
        Some(i) => &body[i..],
        None => body,
    }
}

/// Worldwide queries use an empty geo upstream.
fn upstream_geo(geo: &str) -> &str {
    if geo.eq_ignore_ascii_case("global") {
        ""
    } else {
        geo
    }
}

impl GoogleTrendsInterest {
    pub fn new(base: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_body(&self, url: &str, query: &[(&str, &str)]) -> Result<String, InterestError> {
        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| InterestError::Transport(e.into()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(InterestError::Transport(anyhow::anyhow!(
                "{url} answered HTTP {status}"
            )));
        }
        resp.text()
            .await
            .map_err(|e| InterestError::Transport(e.into()))
    }

    async fn query_chunk(
        &self,
        terms: &[String],
        timeframe: Timeframe,
        geo: &str,
    ) -> Result<InterestTable, InterestError> {
        let comparison: Vec<serde_json::Value> = terms
            .iter()
            .map(|k| {
                serde_json::json!({
                    "keyword": k,
                    "geo": upstream_geo(geo),
                    "time": timeframe.as_query(),
                })
            })
            .collect();
        let explore_req = serde_json::json!({
            "comparisonItem": comparison,
            "category": 0,
            "property": "",
        })
        .to_string();

        let body = self
            .get_body(
                &format!("{}/api/explore", self.base),
                &[("hl", "en-US"), ("tz", "0"), ("req", explore_req.as_str())],
            )
            .await?;
        let explore: ExploreResp = serde_json::from_str(strip_xssi(&body))
            .map_err(|e| InterestError::Malformed(format!("explore: {e}")))?;
        let widget = explore
            .widgets
            .into_iter()
            .find(|w| w.id == "TIMESERIES")
            .ok_or_else(|| InterestError::Malformed("explore: no TIMESERIES widget".into()))?;

        let widget_req = widget.request.to_string();
        let body = self
            .get_body(
                &format!("{}/api/widgetdata/multiline", self.base),
                &[
                    ("hl", "en-US"),
                    ("tz", "0"),
                    ("req", widget_req.as_str()),
                    ("token", widget.token.as_str()),
                ],
            )
            .await?;
        parse_multiline(&body, terms)
    }
}

/// Decode a multiline payload into a table whose columns are `terms`, in order.
pub fn parse_multiline(body: &str, terms: &[String]) -> Result<InterestTable, InterestError> {
    let resp: MultilineResp = serde_json::from_str(strip_xssi(body))
        .map_err(|e| InterestError::Malformed(format!("multiline: {e}")))?;
    let mut table = InterestTable::default();
    for p in resp.default.timeline_data {
        if p.value.len() != terms.len() {
            return Err(InterestError::Malformed(format!(
                "row has {} values for {} terms",
                p.value.len(),
                terms.len()
            )));
        }
        let secs: i64 = p
            .time
            .parse()
            .map_err(|_| InterestError::Malformed(format!("bad time {:?}", p.time)))?;
        let time = DateTime::<Utc>::from_timestamp(secs, 0)
            .ok_or_else(|| InterestError::Malformed(format!("time out of range: {secs}")))?;
        table.push(InterestRow {
            time,
            values: terms.iter().cloned().zip(p.value).collect(),
            is_partial: p.is_partial,
        });
    }
    Ok(table)
}

#[async_trait]
impl InterestService for GoogleTrendsInterest {
    async fn interest_over_time(
        &self,
        terms: &[String],
        timeframe: Timeframe,
        geo: &str,
    ) -> Result<InterestTable, InterestError> {
        let mut table = InterestTable::default();
        for chunk in terms.chunks(MAX_TERMS_PER_QUERY) {
            counter!("volume_queries_total").increment(1);
            table.merge(self.query_chunk(chunk, timeframe, geo).await?);
        }
        Ok(table)
    }

    fn name(&self) -> &'static str {
        "google-trends"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiline_payload_with_prefix_and_partial_row() {
        let body = r#")]}',
{"default":{"timelineData":[
  {"time":"1760000000","formattedTime":"x","value":[10,0],"hasData":[true,false]},
  {"time":"1760003600","formattedTime":"y","value":[15,3],"hasData":[true,true],"isPartial":true}
]}}"#;
        let terms = vec!["a".to_string(), "b".to_string()];
        let table = parse_multiline(body, &terms).unwrap();
        let series = table.into_series(&terms);
        assert_eq!(series.len(), 2);
        let a: Vec<f64> = series[0].points.iter().map(|p| p.1).collect();
        assert_eq!(a, vec![10.0, 15.0]);
        assert_eq!(series[1].term, "b");
    }

    #[test]
    fn multiline_value_count_mismatch_is_malformed() {
        let body = r#"{"default":{"timelineData":[{"time":"1760000000","value":[1]}]}}"#;
        let terms = vec!["a".to_string(), "b".to_string()];
        assert!(matches!(
            parse_multiline(body, &terms),
            Err(InterestError::Malformed(_))
        ));
    }

    #[test]
    fn tables_merge_columns_by_time() {
        let t0 = DateTime::<Utc>::from_timestamp(1_760_000_000, 0).unwrap();
        let mut left = InterestTable::from_rows(vec![InterestRow {
            time: t0,
            values: [("a".to_string(), 1.0)].into_iter().collect(),
            is_partial: false,
        }]);
        left.merge(InterestTable::from_rows(vec![InterestRow {
            time: t0,
            values: [("f".to_string(), 2.0)].into_iter().collect(),
            is_partial: true,
        }]));
        let s = left.into_series(&["f".to_string(), "a".to_string(), "z".to_string()]);
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].term, "f");
    }

    #[test]
    fn timeframes_map_to_upstream_strings() {
        assert_eq!(Timeframe::default().as_query(), "now 7-d");
        assert_eq!(upstream_geo("GLOBAL"), "");
        assert_eq!(upstream_geo("US"), "US");
    }
}
