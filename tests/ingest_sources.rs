// tests/ingest_sources.rs
//
// Source adapters against fixtures and fake clients (no network).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use trend_radar::error::FetchErrorKind;
use trend_radar::ingest::providers::html_scrape::HtmlTrendSource;
use trend_radar::ingest::providers::rss::RssTrendSource;
use trend_radar::ingest::providers::trends_client::{
    ClientTrendSource, HotTrendsClient, TrendsClient,
};
use trend_radar::ingest::config::FeedConfig;
use trend_radar::ingest::types::{TimePeriod, TrendSource};
use trend_radar::ingest::{fetch_trending_terms, filter_time_period, top_by_traffic};

const DAILY_XML: &str = include_str!("fixtures/trends_daily.xml");
const PAGE_HTML: &str = include_str!("fixtures/trending_page.html");
const HOT_JSON: &str = include_str!("fixtures/hot_trends.json");

fn topics(items: &[trend_radar::ingest::types::TrendItem]) -> Vec<&str> {
    items.iter().map(|i| i.topic.as_str()).collect()
}

#[tokio::test]
async fn rss_fixture_is_normalized_and_deduplicated() {
    let src = RssTrendSource::from_fixture("daily", DAILY_XML);
    let items = fetch_trending_terms(&src, "US").await.expect("fixture parses");

    assert_eq!(
        topics(&items),
        vec!["GPT-5 launch", "Local bakery", "Fed & rates", "Old news"]
    );
    assert!(items.iter().all(|i| i.feed == "daily"));

    let fed = &items[2];
    let expected: DateTime<Utc> = "2025-10-13T10:30:00Z".parse().unwrap();
    assert_eq!(fed.published_at, Some(expected));
    assert_eq!(fed.traffic_numeric(), 50_000);
    assert_eq!(items[0].traffic_numeric(), 200_000);
}

#[tokio::test]
async fn time_period_and_traffic_rank_over_fixture() {
    let src = RssTrendSource::from_fixture("daily", DAILY_XML);
    let items = fetch_trending_terms(&src, "US").await.unwrap();
    let now: DateTime<Utc> = "2025-10-13T12:00:00Z".parse().unwrap();

    let recent = filter_time_period(items.clone(), TimePeriod::Last24h, now);
    assert_eq!(recent.len(), 3);
    let all = filter_time_period(items, TimePeriod::All, now);
    assert_eq!(all.len(), 4);

    let ranks = top_by_traffic(&recent);
    let order: Vec<&str> = ranks.iter().map(|r| r.topic.as_str()).collect();
    assert_eq!(order, vec!["GPT-5 launch", "Fed & rates", "Local bakery"]);
}

#[tokio::test]
async fn rss_garbage_is_a_parse_error() {
    let src = RssTrendSource::from_fixture("daily", "<html>maintenance</html>");
    let err = fetch_trending_terms(&src, "US").await.unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::Parse);
    assert_eq!(err.source, "rss:daily");
}

#[tokio::test]
async fn one_bad_feed_fails_the_whole_fetch() {
    let src = RssTrendSource::from_fixtures(vec![
        ("daily".to_string(), DAILY_XML.to_string()),
        ("realtime".to_string(), "not xml at all".to_string()),
    ]);
    let err = fetch_trending_terms(&src, "US").await.unwrap_err();
    assert_eq!(err.source, "rss:realtime");
}

#[tokio::test]
async fn html_fixture_keeps_only_class_token_anchors() {
    let src = HtmlTrendSource::from_fixture(PAGE_HTML, Some("title"));
    let items = fetch_trending_terms(&src, "US").await.unwrap();
    assert_eq!(
        topics(&items),
        vec!["GPT-5 launch", "Champions League", "Rock & Roll"]
    );
    assert!(items.iter().all(|i| i.published_at.is_none()));
}

#[tokio::test]
async fn html_without_anchors_is_a_parse_error() {
    let src = HtmlTrendSource::from_fixture("<html><body>nothing</body></html>", None);
    let err = fetch_trending_terms(&src, "US").await.unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::Parse);
}

#[test]
fn hot_trends_payload_selects_region_or_merges_globally() {
    let data: BTreeMap<String, Vec<String>> = serde_json::from_str(HOT_JSON).unwrap();
    let us = HotTrendsClient::select_region(&data, "US").unwrap();
    assert_eq!(us[0], "GPT-5 launch");
    assert_eq!(us.len(), 3);

    let global = HotTrendsClient::select_region(&data, "global").unwrap();
    assert_eq!(global.len(), 5);

    assert!(HotTrendsClient::select_region(&data, "ZZ").is_err());
}

/// Answers only for the regions it knows, recording every call.
struct RegionClient {
    known: BTreeMap<String, Vec<String>>,
    calls: Mutex<Vec<String>>,
}

impl RegionClient {
    fn new(known: &[(&str, Vec<&str>)]) -> Arc<Self> {
        Arc::new(Self {
            known: known
                .iter()
                .map(|(r, t)| (r.to_string(), t.iter().map(|s| s.to_string()).collect()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrendsClient for RegionClient {
    async fn trending_now(&self, region: &str) -> anyhow::Result<Vec<String>> {
        self.calls.lock().unwrap().push(region.to_string());
        self.known
            .get(region)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no data for {region}"))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

#[tokio::test]
async fn client_retries_once_with_global_region() {
    let client = RegionClient::new(&[("global", vec!["Eclipse", "Eclipse", "Cup final"])]);
    let src = ClientTrendSource::new(client.clone(), "global".to_string());

    let items = fetch_trending_terms(&src, "ZZ").await.unwrap();
    assert_eq!(topics(&items), vec!["Eclipse", "Cup final"]);
    assert_eq!(client.calls(), vec!["ZZ".to_string(), "global".to_string()]);
}

#[tokio::test]
async fn client_fallback_failure_surfaces_fetch_error() {
    let client = RegionClient::new(&[]);
    let src = ClientTrendSource::new(client.clone(), "global".to_string());

    let err = src.fetch("ZZ").await.unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::Transport);
    assert_eq!(err.source, "client");
    assert_eq!(client.calls().len(), 2, "exactly one retry");
}

#[tokio::test]
async fn client_does_not_retry_when_already_global() {
    let client = RegionClient::new(&[]);
    let src = ClientTrendSource::new(client.clone(), "global".to_string());
    assert!(src.fetch("global").await.is_err());
    assert_eq!(client.calls(), vec!["global".to_string()]);
}

#[tokio::test]
async fn region_with_url_syntax_is_refused_before_any_request() {
    let client = RegionClient::new(&[("US", vec!["Eclipse"])]);
    let src = ClientTrendSource::new(client.clone(), "global".to_string());

    for region in ["US&x=1", "US/../admin", ""] {
        let err = fetch_trending_terms(&src, region).await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Region, "{region}");
        assert_eq!(err.source, "client");
    }
    assert!(client.calls().is_empty());
}

/// Serves one canned HTTP response on a local port and hands back the request line.
async fn one_shot_server(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 4096];
        let n = sock.read(&mut buf).await.unwrap();
        sock.write_all(response.as_bytes()).await.unwrap();
        sock.shutdown().await.ok();
        let req = String::from_utf8_lossy(&buf[..n]).to_string();
        req.lines().next().unwrap_or_default().to_string()
    });
    (addr.to_string(), handle)
}

#[tokio::test]
async fn rss_upstream_non_success_becomes_status_error() {
    let (addr, server) = one_shot_server(
        "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
    )
    .await;
    let src = RssTrendSource::from_feeds(
        vec![FeedConfig {
            name: "daily".into(),
            url: format!("http://{addr}/trends/rss?geo={{geo}}"),
        }],
        reqwest::Client::new(),
    );

    let err = fetch_trending_terms(&src, "GB").await.unwrap_err();
    assert_eq!(err.kind, FetchErrorKind::Status(503));
    assert_eq!(err.source, "rss:daily");
    assert!(err.to_string().contains("503"));

    let request_line = server.await.unwrap();
    assert!(request_line.starts_with("GET /trends/rss?geo=GB "), "{request_line}");
}
