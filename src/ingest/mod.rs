// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod types;

use crate::error::FetchError;
use crate::ingest::types::{TimePeriod, TrendItem, TrendSource};
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("trends_items_total", "Trend items parsed from sources.");
        describe_counter!(
            "trends_kept_total",
            "Trend items kept after normalization + dedup."
        );
        describe_counter!("trends_dedup_total", "Trend items removed as duplicates.");
        describe_counter!(
            "trends_fetch_errors_total",
            "Source fetch/parse errors."
        );
        describe_histogram!("trends_parse_ms", "Source parse time in milliseconds.");
        describe_gauge!(
            "trends_last_fetch_ts",
            "Unix ts of the last successful trend fetch."
        );
    });
}

/// Normalize a topic: decode entities, strip tags, unify quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // Topics are search phrases; anything longer is page noise.
    if out.chars().count() > 200 {
        out = out.chars().take(200).collect();
    }
    out
}

/// Normalize topics, drop empties and deduplicate.
///
/// Key is `(topic, published_at)`; undated items collapse on `topic` alone.
/// First occurrence wins, so output keeps fetch order.
/// Returns (kept, dropped_empty, dropped_dup).
pub fn normalize_dedup(raw: Vec<TrendItem>) -> (Vec<TrendItem>, usize, usize) {
    let mut empty = 0usize;
    let mut dup = 0usize;
    let mut seen: HashSet<(String, Option<DateTime<Utc>>)> = HashSet::new();
    let mut keep = Vec::with_capacity(raw.len());

    for mut it in raw {
        it.topic = normalize_text(&it.topic);
        if it.topic.is_empty() {
            empty += 1;
            continue;
        }
        if !seen.insert((it.topic.clone(), it.published_at)) {
            dup += 1;
            continue;
        }
        keep.push(it);
    }
    (keep, empty, dup)
}

/// Region codes are spliced into provider URLs as-is, so only
/// `[A-Za-z0-9_-]{1,64}` gets through (`US`, `GB`, `US-CA`, `global`).
pub fn is_valid_region(region: &str) -> bool {
    static RE_REGION: OnceCell<regex::Regex> = OnceCell::new();
    let re = RE_REGION.get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap());
    re.is_match(region)
}

/// Fetch from one source, then normalize + dedup. Any source failure is fatal.
pub async fn fetch_trending_terms(
    source: &dyn TrendSource,
    region: &str,
) -> Result<Vec<TrendItem>, FetchError> {
    ensure_metrics_described();

    if !is_valid_region(region) {
        tracing::warn!(source = source.kind().as_str(), region, "rejected region code");
        return Err(FetchError::region(source.kind().as_str(), region));
    }

    let raw = match source.fetch(region).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, source = source.kind().as_str(), region, "trend fetch failed");
            counter!("trends_fetch_errors_total").increment(1);
            return Err(e);
        }
    };

    let fetched = raw.len();
    let (kept, empty, dup) = normalize_dedup(raw);

    counter!("trends_kept_total").increment(kept.len() as u64);
    counter!("trends_dedup_total").increment(dup as u64);
    metrics::gauge!("trends_last_fetch_ts").set(Utc::now().timestamp() as f64);

    tracing::info!(
        target: "ingest",
        source = source.kind().as_str(),
        region,
        fetched,
        kept = kept.len(),
        empty,
        dup,
        "trend fetch done"
    );
    Ok(kept)
}

/// Keep items published within `period` of `now`. Undated items are kept.
pub fn filter_time_period(
    items: Vec<TrendItem>,
    period: TimePeriod,
    now: DateTime<Utc>,
) -> Vec<TrendItem> {
    let Some(cutoff) = period.cutoff(now) else {
        return items;
    };
    items
        .into_iter()
        .filter(|it| it.published_at.map_or(true, |ts| ts >= cutoff))
        .collect()
}

/// Distinct topics in first-seen order.
pub fn unique_topics(items: &[TrendItem]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|it| seen.insert(it.topic.as_str()))
        .map(|it| it.topic.clone())
        .collect()
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TrafficRank {
    pub topic: String,
    pub traffic: u64,
}

/// Max traffic per topic, highest first; ties keep first-seen order.
pub fn top_by_traffic(items: &[TrendItem]) -> Vec<TrafficRank> {
    let mut order: Vec<&str> = Vec::new();
    let mut best: HashMap<&str, u64> = HashMap::new();
    for it in items {
        let n = it.traffic_numeric();
        match best.get_mut(it.topic.as_str()) {
            Some(cur) => *cur = (*cur).max(n),
            None => {
                order.push(it.topic.as_str());
                best.insert(it.topic.as_str(), n);
            }
        }
    }
    let mut ranks: Vec<TrafficRank> = order
        .into_iter()
        .map(|t| TrafficRank {
            topic: t.to_string(),
            traffic: best.get(t).copied().unwrap_or(0),
        })
        .collect();
    ranks.sort_by(|a, b| b.traffic.cmp(&a.traffic));
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Traffic;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 13, h, 0, 0).unwrap()
    }

    #[test]
    fn normalize_text_collapses_ws_and_entities() {
        let s = "  <b>GPT-5</b>&nbsp;&nbsp; launch  ";
        assert_eq!(normalize_text(s), "GPT-5 launch");
    }

    #[test]
    fn dedup_by_topic_and_timestamp() {
        let raw = vec![
            TrendItem::new("GPT-5 launch", "daily").published(at(8)),
            TrendItem::new("GPT-5 launch", "realtime").published(at(8)),
            TrendItem::new("GPT-5 launch", "daily").published(at(9)),
            TrendItem::new("   ", "daily"),
        ];
        let (kept, empty, dup) = normalize_dedup(raw);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].feed, "daily");
        assert_eq!(empty, 1);
        assert_eq!(dup, 1);
    }

    #[test]
    fn undated_items_dedup_on_topic_alone() {
        let raw = vec![
            TrendItem::new("Local bakery", "html"),
            TrendItem::new(" Local  bakery ", "html"),
        ];
        let (kept, _, dup) = normalize_dedup(raw);
        assert_eq!(kept.len(), 1);
        assert_eq!(dup, 1);
    }

    #[test]
    fn period_filter_keeps_recent_and_undated() {
        let now = at(20);
        let items = vec![
            TrendItem::new("recent", "daily").published(at(10)),
            TrendItem::new("undated", "html"),
            TrendItem::new("old", "daily").published(now - chrono::Duration::days(3)),
        ];
        let out = filter_time_period(items.clone(), TimePeriod::Last48h, now);
        let topics: Vec<_> = out.iter().map(|i| i.topic.as_str()).collect();
        assert_eq!(topics, vec!["recent", "undated"]);
        assert_eq!(filter_time_period(items, TimePeriod::All, now).len(), 3);
    }

    #[test]
    fn region_codes_are_plain_identifiers() {
        for ok in ["US", "gb", "US-CA", "global", "en_GB"] {
            assert!(is_valid_region(ok), "{ok}");
        }
        for bad in ["", "US&x=1", "US/../admin", "U S", "US?q", "US#top", "D\u{e9}"] {
            assert!(!is_valid_region(bad), "{bad}");
        }
    }

    #[test]
    fn traffic_rank_takes_max_per_topic() {
        let items = vec![
            TrendItem::new("a", "daily").with_traffic(Traffic::Label("1,000+".into())),
            TrendItem::new("b", "daily").with_traffic(Traffic::Label("50K+".into())),
            TrendItem::new("a", "realtime").with_traffic(Traffic::Label("5,000+".into())),
            TrendItem::new("c", "html"),
        ];
        let ranks = top_by_traffic(&items);
        assert_eq!(ranks[0], TrafficRank { topic: "b".into(), traffic: 50_000 });
        assert_eq!(ranks[1], TrafficRank { topic: "a".into(), traffic: 5_000 });
        assert_eq!(ranks[2].traffic, 0);
    }
}
