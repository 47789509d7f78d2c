// src/ingest/providers/rss.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::error::FetchError;
use crate::ingest::config::FeedConfig;
use crate::ingest::providers::get_text;
use crate::ingest::types::{SourceKind, Traffic, TrendItem, TrendSource};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    // Namespaced `ht:approx_traffic`; accept it with or without the prefix.
    #[serde(rename = "approx_traffic", alias = "ht:approx_traffic")]
    approx_traffic: Option<String>,
}

/// RFC-2822 dates as served by the feed ("Mon, 13 Oct 2025 08:40:00 -0700" or "... GMT").
fn parse_pub_date(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(ts.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub struct RssTrendSource {
    mode: Mode,
}

enum Mode {
    // (feed name, xml) pairs; the region is ignored.
    Fixture(Vec<(String, String)>),
    Http {
        feeds: Vec<FeedConfig>,
        client: reqwest::Client,
    },
}

impl RssTrendSource {
    pub fn from_fixture(feed: &str, xml: &str) -> Self {
        Self {
            mode: Mode::Fixture(vec![(feed.to_string(), xml.to_string())]),
        }
    }

    pub fn from_fixtures(feeds: Vec<(String, String)>) -> Self {
        Self {
            mode: Mode::Fixture(feeds),
        }
    }

    pub fn from_feeds(feeds: Vec<FeedConfig>, client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http { feeds, client },
        }
    }

    pub fn parse_items_from_str(feed: &str, s: &str) -> Result<Vec<TrendItem>, FetchError> {
        let t0 = std::time::Instant::now();
        let source = format!("rss:{feed}");
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).map_err(|e| FetchError::parse(&source, e))?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let topic = it.title.unwrap_or_default();
            if topic.trim().is_empty() {
                continue;
            }
            let mut item = TrendItem::new(topic, feed);
            match it.pub_date.as_deref().map(|d| (d, parse_pub_date(d))) {
                Some((_, Some(ts))) => item = item.published(ts),
                Some((raw, None)) => {
                    tracing::debug!(feed, pub_date = raw, "unparsable pubDate, item left undated")
                }
                None => {}
            }
            if let Some(t) = it.approx_traffic.map(|t| t.trim().to_string()) {
                if !t.is_empty() {
                    item = item.with_traffic(Traffic::Label(t));
                }
            }
            out.push(item);
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("trends_parse_ms").record(ms);
        counter!("trends_items_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl TrendSource for RssTrendSource {
    async fn fetch(&self, region: &str) -> Result<Vec<TrendItem>, FetchError> {
        let mut all = Vec::new();
        match &self.mode {
            Mode::Fixture(feeds) => {
                for (name, xml) in feeds {
                    all.extend(Self::parse_items_from_str(name, xml)?);
                }
            }
            Mode::Http { feeds, client } => {
                // Feeds are read in configured order; one failing feed fails the fetch.
                for feed in feeds {
                    let url = feed.url_for(region);
                    tracing::debug!(feed = %feed.name, %url, "fetching rss feed");
                    let body = get_text(client, &url, &format!("rss:{}", feed.name)).await?;
                    all.extend(Self::parse_items_from_str(&feed.name, &body)?);
                }
            }
        }
        Ok(all)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Rss
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
