// src/ingest/providers/mod.rs
pub mod html_scrape;
pub mod rss;
pub mod trends_client;

use reqwest::Client;

use crate::error::FetchError;
use crate::ingest::config::SourcesConfig;
use crate::ingest::types::{SourceKind, TrendSource};

/// GET `url` and return the body; non-2xx and transport failures become `FetchError`.
pub(crate) async fn get_text(client: &Client, url: &str, source: &str) -> Result<String, FetchError> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::transport(source, e))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::status(source, status.as_u16()));
    }
    resp.text()
        .await
        .map_err(|e| FetchError::transport(source, e))
}

/// Build the configured strategy over a shared HTTP client.
pub fn build_source(kind: SourceKind, cfg: &SourcesConfig, client: Client) -> Box<dyn TrendSource> {
    match kind {
        SourceKind::Rss => Box::new(rss::RssTrendSource::from_feeds(
            cfg.rss.feeds.clone(),
            client,
        )),
        SourceKind::Html => Box::new(html_scrape::HtmlTrendSource::from_url(
            cfg.html.url.clone(),
            cfg.html.anchor_class.clone(),
            client,
        )),
        SourceKind::Client => {
            let hot = trends_client::HotTrendsClient::new(cfg.client.url.clone(), client);
            Box::new(trends_client::ClientTrendSource::new(
                std::sync::Arc::new(hot),
                cfg.client.fallback_region.clone(),
            ))
        }
    }
}
