// src/ingest/config.rs
//! Source settings as they appear under `[sources]` in `config/trends.toml`.

use serde::{Deserialize, Serialize};

pub const DEFAULT_DAILY_FEED: &str =
    "https://trends.google.com/trends/trendingsearches/daily/rss?geo={geo}";
pub const DEFAULT_REALTIME_FEED: &str =
    "https://trends.google.com/trends/trendingsearches/realtime/rss?geo={geo}";
pub const DEFAULT_HOT_TRENDS_URL: &str =
    "https://trends.google.com/trends/hottrends/visualize/internal/data";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedConfig {
    pub name: String,
    /// `{geo}` is replaced with the run's region.
    pub url: String,
}

impl FeedConfig {
    pub fn url_for(&self, region: &str) -> String {
        self.url.replace("{geo}", region)
    }
}

fn default_feeds() -> Vec<FeedConfig> {
    vec![
        FeedConfig {
            name: "daily".into(),
            url: DEFAULT_DAILY_FEED.into(),
        },
        FeedConfig {
            name: "realtime".into(),
            url: DEFAULT_REALTIME_FEED.into(),
        },
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssConfig {
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedConfig>,
}

impl Default for RssConfig {
    fn default() -> Self {
        Self {
            feeds: default_feeds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HtmlConfig {
    /// Page to scrape; `{geo}` is replaced with the run's region.
    #[serde(default)]
    pub url: String,
    /// Class token an anchor must carry; every anchor matches when unset.
    #[serde(default)]
    pub anchor_class: Option<String>,
}

fn default_hot_trends_url() -> String {
    DEFAULT_HOT_TRENDS_URL.to_string()
}
fn default_fallback_region() -> String {
    "global".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_hot_trends_url")]
    pub url: String,
    #[serde(default = "default_fallback_region")]
    pub fallback_region: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_hot_trends_url(),
            fallback_region: default_fallback_region(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub rss: RssConfig,
    #[serde(default)]
    pub html: HtmlConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_url_substitutes_region() {
        let f = FeedConfig {
            name: "daily".into(),
            url: DEFAULT_DAILY_FEED.into(),
        };
        assert!(f.url_for("GB").ends_with("rss?geo=GB"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: SourcesConfig = toml::from_str(
            r#"
[html]
url = "https://example.test/trending"
anchor_class = "title"
"#,
        )
        .unwrap();
        assert_eq!(cfg.rss.feeds.len(), 2);
        assert_eq!(cfg.client.fallback_region, "global");
        assert_eq!(cfg.html.anchor_class.as_deref(), Some("title"));
    }
}
