// src/bootstrap.rs
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::cache::ClassificationCache;
use crate::classify::oracle::build_oracle;
use crate::classify::Classifier;
use crate::config::AppConfig;
use crate::ingest::providers::build_source;
use crate::pipeline::Pipeline;
use crate::volume::interest::GoogleTrendsInterest;
use crate::volume::VolumeAnalyzer;

/// Everything a binary needs: the resolved config and the wired pipeline.
pub struct TrendRuntime {
    pub cfg: AppConfig,
    pub pipeline: Arc<Pipeline>,
}

impl TrendRuntime {
    /// Load config from `TRENDS_CONFIG_PATH` (or defaults) and wire the pipeline.
    pub fn from_env() -> Result<Self> {
        let cfg = AppConfig::load_default()?;
        Self::from_config(cfg)
    }

    pub fn from_config(cfg: AppConfig) -> Result<Self> {
        let pipeline = build_pipeline(&cfg)?;
        Ok(Self {
            cfg,
            pipeline: Arc::new(pipeline),
        })
    }
}

/// Construct every collaborator explicitly over one shared HTTP client.
pub fn build_pipeline(cfg: &AppConfig) -> Result<Pipeline> {
    let http = cfg.http.build_client()?;
    let taxonomy = cfg.taxonomy().context("loading category taxonomy")?;

    // Safe diagnostics: provider + mode + key length only
    info!(
        source = cfg.source.as_str(),
        region = %cfg.region,
        provider = %cfg.oracle.provider,
        mode = ?cfg.oracle.mode,
        key_len = cfg.oracle.api_key.len(),
        categories = taxonomy.names().len(),
        "trend pipeline config loaded"
    );

    let source = build_source(cfg.source, &cfg.sources, http.clone());
    let oracle = build_oracle(&cfg.oracle, http.clone()).context("building oracle")?;

    let mut classifier = Classifier::new(oracle, cfg.oracle.mode);
    if cfg.cache.enabled {
        let cache = ClassificationCache::open(&cfg.cache.path);
        info!(path = %cache.path().display(), entries = cache.len(), "classification cache enabled");
        classifier = classifier.with_cache(Arc::new(cache));
    }

    let mut pipeline = Pipeline::new(source, classifier, taxonomy);
    if cfg.volume.enabled {
        let service = GoogleTrendsInterest::new(cfg.volume.base_url.clone(), http);
        pipeline = pipeline.with_volume(
            VolumeAnalyzer::new(Arc::new(service), cfg.region.clone()),
            cfg.volume.timeframe,
        );
    }
    Ok(pipeline)
}
