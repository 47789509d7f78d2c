// src/ingest/providers/html_scrape.rs
//! Server-rendered trending page: every `<a>` carrying the configured class token
//! is one topic. Scraped items have no timestamp and no traffic figure.

use async_trait::async_trait;
use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::error::FetchError;
use crate::ingest::normalize_text;
use crate::ingest::providers::get_text;
use crate::ingest::types::{SourceKind, TrendItem, TrendSource};

const SOURCE: &str = "html";

fn re_anchor() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r#"(?is)<a\b([^>]*)>(.*?)</a\s*>"#).unwrap())
}

fn re_class() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r#"(?is)\bclass\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap())
}

fn has_class(attrs: &str, token: &str) -> bool {
    re_class()
        .captures(attrs)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .is_some_and(|m| m.as_str().split_whitespace().any(|c| c == token))
}

/// Anchor texts in document order, trimmed, empties dropped.
pub fn extract_anchor_texts(html: &str, anchor_class: Option<&str>) -> Vec<String> {
    re_anchor()
        .captures_iter(html)
        .filter(|c| match anchor_class {
            Some(token) => has_class(c.get(1).map_or("", |m| m.as_str()), token),
            None => true,
        })
        .filter_map(|c| c.get(2))
        .map(|m| normalize_text(m.as_str()))
        .filter(|t| !t.is_empty())
        .collect()
}

pub struct HtmlTrendSource {
    mode: Mode,
    anchor_class: Option<String>,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl HtmlTrendSource {
    pub fn from_fixture(html: &str, anchor_class: Option<&str>) -> Self {
        Self {
            mode: Mode::Fixture(html.to_string()),
            anchor_class: anchor_class.map(str::to_string),
        }
    }

    pub fn from_url(url: String, anchor_class: Option<String>, client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http { url, client },
            anchor_class,
        }
    }

    fn parse(&self, html: &str) -> Result<Vec<TrendItem>, FetchError> {
        let t0 = std::time::Instant::now();
        if !html.to_ascii_lowercase().contains("<a") {
            return Err(FetchError::parse(SOURCE, "page contains no anchors"));
        }
        let out: Vec<TrendItem> = extract_anchor_texts(html, self.anchor_class.as_deref())
            .into_iter()
            .map(|t| TrendItem::new(t, SOURCE))
            .collect();

        histogram!("trends_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("trends_items_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl TrendSource for HtmlTrendSource {
    async fn fetch(&self, region: &str) -> Result<Vec<TrendItem>, FetchError> {
        match &self.mode {
            Mode::Fixture(s) => self.parse(s),
            Mode::Http { url, client } => {
                if url.trim().is_empty() {
                    return Err(FetchError::transport(SOURCE, "no scrape url configured"));
                }
                let body = get_text(client, &url.replace("{geo}", region), SOURCE).await?;
                self.parse(&body)
            }
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Html
    }
}
