// src/ingest/providers/trends_client.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::counter;

use crate::error::FetchError;
use crate::ingest::types::{SourceKind, TrendItem, TrendSource};

const SOURCE: &str = "client";

/// Region name used when every region should be merged.
pub const GLOBAL_REGION: &str = "global";

/// External trends-query client ("trending now" for a region).
#[async_trait]
pub trait TrendsClient: Send + Sync {
    async fn trending_now(&self, region: &str) -> Result<Vec<String>>;
    fn name(&self) -> &'static str;
}

/// Reads the public hot-trends JSON: `{ "united_states": ["term", ...], ... }`.
pub struct HotTrendsClient {
    url: String,
    http: reqwest::Client,
}

impl HotTrendsClient {
    pub fn new(url: String, http: reqwest::Client) -> Self {
        Self { url, http }
    }

    /// Pick the list for `region` out of the decoded payload.
    pub fn select_region(data: &BTreeMap<String, Vec<String>>, region: &str) -> Result<Vec<String>> {
        if region.eq_ignore_ascii_case(GLOBAL_REGION) {
            if data.is_empty() {
                return Err(anyhow!("hot trends payload has no regions"));
            }
            return Ok(data.values().flatten().cloned().collect());
        }
        let key = region_key(region);
        data.get(&key)
            .cloned()
            .ok_or_else(|| anyhow!("region {region} ({key}) not in hot trends payload"))
    }
}

/// ISO code or free-form name -> payload key (`united_states`).
fn region_key(region: &str) -> String {
    let r = region.trim();
    let named = match r.to_ascii_uppercase().as_str() {
        "US" => "united_states",
        "GB" | "UK" => "united_kingdom",
        "CA" => "canada",
        "AU" => "australia",
        "IN" => "india",
        "DE" => "germany",
        "FR" => "france",
        "JP" => "japan",
        "BR" => "brazil",
        _ => "",
    };
    if !named.is_empty() {
        return named.to_string();
    }
    r.to_ascii_lowercase().replace([' ', '-'], "_")
}

#[async_trait]
impl TrendsClient for HotTrendsClient {
    async fn trending_now(&self, region: &str) -> Result<Vec<String>> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .context("hot trends get()")?
            .error_for_status()
            .context("hot trends status")?;
        let data: BTreeMap<String, Vec<String>> =
            resp.json().await.context("decoding hot trends json")?;
        Self::select_region(&data, region)
    }

    fn name(&self) -> &'static str {
        "hottrends"
    }
}

/// Trend source backed by a `TrendsClient`, retrying once with a broader region.
pub struct ClientTrendSource {
    client: Arc<dyn TrendsClient>,
    fallback_region: String,
}

impl ClientTrendSource {
    pub fn new(client: Arc<dyn TrendsClient>, fallback_region: String) -> Self {
        Self {
            client,
            fallback_region,
        }
    }
}

#[async_trait]
impl TrendSource for ClientTrendSource {
    async fn fetch(&self, region: &str) -> Result<Vec<TrendItem>, FetchError> {
        let terms = match self.client.trending_now(region).await {
            Ok(t) => t,
            Err(first) if !region.eq_ignore_ascii_case(&self.fallback_region) => {
                tracing::warn!(
                    error = %format!("{first:#}"),
                    region,
                    fallback = %self.fallback_region,
                    client = self.client.name(),
                    "trending_now failed, retrying with fallback region"
                );
                counter!("trends_fetch_errors_total").increment(1);
                self.client
                    .trending_now(&self.fallback_region)
                    .await
                    .map_err(|e| FetchError::transport(SOURCE, format!("{e:#}")))?
            }
            Err(e) => return Err(FetchError::transport(SOURCE, format!("{e:#}"))),
        };

        counter!("trends_items_total").increment(terms.len() as u64);
        Ok(terms
            .into_iter()
            .map(|t| TrendItem::new(t, SOURCE))
            .collect())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Client
    }
}
