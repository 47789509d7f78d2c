// src/ingest/types.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Approximate search-volume indicator as the source reported it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Traffic {
    Count(u64),
    Label(String), // e.g. "20,000+", "200K+"
}

impl Traffic {
    /// Best-effort integer view; unparsable labels count as 0.
    pub fn numeric(&self) -> u64 {
        match self {
            Traffic::Count(n) => *n,
            Traffic::Label(s) => parse_traffic_label(s),
        }
    }
}

fn parse_traffic_label(s: &str) -> u64 {
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, ',' | '+') && !c.is_whitespace())
        .collect();
    let (digits, mult) = match cleaned.chars().last() {
        Some('K') | Some('k') => (&cleaned[..cleaned.len() - 1], 1_000),
        Some('M') | Some('m') => (&cleaned[..cleaned.len() - 1], 1_000_000),
        _ => (cleaned.as_str(), 1),
    };
    digits.parse::<u64>().map(|n| n.saturating_mul(mult)).unwrap_or(0)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrendItem {
    pub topic: String,
    pub published_at: Option<DateTime<Utc>>,
    pub traffic: Option<Traffic>,
    pub feed: String, // e.g. "daily", "realtime", "html", "client"
}

impl TrendItem {
    pub fn new(topic: impl Into<String>, feed: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            published_at: None,
            traffic: None,
            feed: feed.into(),
        }
    }

    pub fn published(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }

    pub fn with_traffic(mut self, traffic: Traffic) -> Self {
        self.traffic = Some(traffic);
        self
    }

    pub fn traffic_numeric(&self) -> u64 {
        self.traffic.as_ref().map(Traffic::numeric).unwrap_or(0)
    }
}

/// Which strategy a run pulls trending terms from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Rss,
    Html,
    Client,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Rss => "rss",
            SourceKind::Html => "html",
            SourceKind::Client => "client",
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rss" => Ok(SourceKind::Rss),
            "html" | "scrape" => Ok(SourceKind::Html),
            "client" | "trends" => Ok(SourceKind::Client),
            other => anyhow::bail!("unknown source kind: {other}"),
        }
    }
}

/// Look-back filter over `published_at`. Undated items always pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TimePeriod {
    #[default]
    #[serde(rename = "24h")]
    Last24h,
    #[serde(rename = "48h")]
    Last48h,
    #[serde(rename = "7d")]
    Last7d,
    #[serde(rename = "all")]
    All,
}

impl TimePeriod {
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimePeriod::Last24h => Some(now - Duration::hours(24)),
            TimePeriod::Last48h => Some(now - Duration::hours(48)),
            TimePeriod::Last7d => Some(now - Duration::days(7)),
            TimePeriod::All => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimePeriod::Last24h => "24h",
            TimePeriod::Last48h => "48h",
            TimePeriod::Last7d => "7d",
            TimePeriod::All => "all",
        }
    }
}

impl std::str::FromStr for TimePeriod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "24h" => Ok(TimePeriod::Last24h),
            "48h" => Ok(TimePeriod::Last48h),
            "7d" => Ok(TimePeriod::Last7d),
            "all" => Ok(TimePeriod::All),
            other => anyhow::bail!("unknown time period: {other}"),
        }
    }
}

#[async_trait::async_trait]
pub trait TrendSource: Send + Sync {
    /// Raw items in upstream order; normalization and dedup happen in `ingest`.
    async fn fetch(&self, region: &str) -> Result<Vec<TrendItem>, FetchError>;
    fn kind(&self) -> SourceKind;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traffic_labels_parse_like_the_dashboard() {
        assert_eq!(Traffic::Label("20,000+".into()).numeric(), 20_000);
        assert_eq!(Traffic::Label("200K+".into()).numeric(), 200_000);
        assert_eq!(Traffic::Label("2M+".into()).numeric(), 2_000_000);
        assert_eq!(Traffic::Label("N/A".into()).numeric(), 0);
        assert_eq!(Traffic::Count(42).numeric(), 42);
    }

    #[test]
    fn period_and_kind_parse_from_query_strings() {
        assert_eq!("48H".parse::<TimePeriod>().unwrap(), TimePeriod::Last48h);
        assert_eq!("scrape".parse::<SourceKind>().unwrap(), SourceKind::Html);
        assert!("weekly".parse::<TimePeriod>().is_err());
    }
}
