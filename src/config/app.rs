// src/config/app.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{env, fs, path::Path, path::PathBuf};

use crate::classify::{CategoryTaxonomy, ClassifyMode};
use crate::ingest::config::SourcesConfig;
use crate::ingest::types::{SourceKind, TimePeriod};
use crate::volume::interest::{Timeframe, DEFAULT_GOOGLE_TRENDS_BASE};

pub const DEFAULT_CONFIG_PATH: &str = "config/trends.toml";
pub const ENV_CONFIG_PATH: &str = "TRENDS_CONFIG_PATH";

fn default_region() -> String {
    "US".to_string()
}
fn default_categories() -> Vec<String> {
    vec!["AI/ML".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub source: SourceKind,
    /// Taxonomy, in display order. Add "Other" here to get a catch-all bucket.
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
    #[serde(default)]
    pub period: TimePeriod,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub volume: VolumeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            source: SourceKind::default(),
            categories: default_categories(),
            period: TimePeriod::default(),
            sources: SourcesConfig::default(),
            http: HttpConfig::default(),
            oracle: OracleConfig::default(),
            cache: CacheConfig::default(),
            volume: VolumeConfig::default(),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    4
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_user_agent() -> String {
    format!("trend-radar/{}", env!("CARGO_PKG_VERSION"))
}

/// Timeouts shared by every outbound call (sources, oracle, interest service).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpConfig {
    pub fn build_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .context("building http client")
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_max_tokens() -> u32 {
    800
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// "openai" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default)]
    pub mode: ClassifyMode,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            endpoint: default_endpoint(),
            api_key: default_api_key(),
            mode: ClassifyMode::default(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_cache_path() -> PathBuf {
    PathBuf::from("cache/topic_cache.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_cache_path(),
        }
    }
}

fn default_trends_base() -> String {
    DEFAULT_GOOGLE_TRENDS_BASE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub timeframe: Timeframe,
    #[serde(default = "default_trends_base")]
    pub base_url: String,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeframe: Timeframe::default(),
            base_url: default_trends_base(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s)?;
        Ok(cfg.finish())
    }

    /// $TRENDS_CONFIG_PATH, then config/trends.toml, then built-in defaults.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            return Self::load_from_file(PathBuf::from(p));
        }
        let p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if p.exists() {
            return Self::load_from_file(&p);
        }
        tracing::info!("no {DEFAULT_CONFIG_PATH}, using built-in defaults");
        Ok(Self::default().finish())
    }

    /// Taxonomy file (if configured) wins over the inline `categories`.
    pub fn taxonomy(&self) -> Result<CategoryTaxonomy> {
        match crate::config::taxonomy::load_taxonomy_default()? {
            Some(t) => Ok(t),
            None => CategoryTaxonomy::new(&self.categories),
        }
    }

    /// Normalize provider, resolve the API key, sanitize out-of-range values.
    fn finish(mut self) -> Self {
        self.oracle.provider = self.oracle.provider.trim().to_lowercase();

        if self.oracle.api_key.trim().eq_ignore_ascii_case("env") {
            self.oracle.api_key = match env::var("OPENAI_API_KEY") {
                Ok(k) => k,
                Err(_) => {
                    tracing::warn!("OPENAI_API_KEY not set; oracle calls will be refused");
                    String::new()
                }
            };
        }

        self.region = self.region.trim().to_string();
        if self.region.is_empty() {
            self.region = default_region();
        }
        if self.http.connect_timeout_secs == 0 {
            self.http.connect_timeout_secs = default_connect_timeout_secs();
        }
        if self.http.timeout_secs == 0 {
            self.http.timeout_secs = default_timeout_secs();
        }
        if self.oracle.max_tokens == 0 {
            self.oracle.max_tokens = default_max_tokens();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn full_file_parses_and_env_key_resolves() {
        env::set_var("OPENAI_API_KEY", "sk-test");
        let cfg = AppConfig::from_toml_str(
            r#"
region = " GB "
source = "html"
categories = ["AI/ML", "Finance", "Other"]
period = "7d"

[http]
timeout_secs = 0

[oracle]
provider = "OpenAI"
mode = "per_term"

[cache]
enabled = false

[volume]
timeframe = "1m"
"#,
        )
        .unwrap();
        env::remove_var("OPENAI_API_KEY");

        assert_eq!(cfg.region, "GB");
        assert_eq!(cfg.source, SourceKind::Html);
        assert_eq!(cfg.period, TimePeriod::Last7d);
        assert_eq!(cfg.http.timeout_secs, 10);
        assert_eq!(cfg.oracle.provider, "openai");
        assert_eq!(cfg.oracle.api_key, "sk-test");
        assert_eq!(cfg.oracle.mode, ClassifyMode::PerTerm);
        assert!(!cfg.cache.enabled);
        assert_eq!(cfg.volume.timeframe, Timeframe::Month);
        assert!(cfg.volume.enabled);
    }

    #[test]
    #[serial_test::serial]
    fn empty_file_is_all_defaults() {
        env::remove_var("OPENAI_API_KEY");
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.region, "US");
        assert_eq!(cfg.categories, vec!["AI/ML".to_string()]);
        assert_eq!(cfg.source, SourceKind::Rss);
        assert!(cfg.oracle.api_key.is_empty());
        assert_eq!(cfg.cache.path, PathBuf::from("cache/topic_cache.json"));
    }
}
