// src/classify/oracle.rs
//! Oracle abstraction: one chat-style request in, raw reply text out.
//! The reply is only ever parsed as text/JSON by the classifier.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::config::app::OracleConfig;

/// Chat request handed to the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OraclePrompt {
    pub system: String,
    pub user: String,
}

#[async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, prompt: &OraclePrompt) -> Result<String>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
    /// False for oracles whose replies are not real decisions; the
    /// classifier then leaves the cache untouched.
    fn caches_replies(&self) -> bool {
        true
    }
}

pub type DynOracle = Arc<dyn Oracle>;

/// Build the oracle according to config and environment.
///
/// * `TREND_ORACLE_MODE=mock` returns a `StaticOracle` answering `{}`.
/// * `provider = "openai"` returns the chat-completions client.
pub fn build_oracle(cfg: &OracleConfig, http: reqwest::Client) -> Result<DynOracle> {
    if std::env::var("TREND_ORACLE_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        tracing::warn!("TREND_ORACLE_MODE=mock: classification replies are stubbed");
        return Ok(Arc::new(StaticOracle::new("{}")));
    }

    match cfg.provider.as_str() {
        "openai" => {
            if cfg.api_key.trim().is_empty() {
                bail!("oracle api_key is empty (set OPENAI_API_KEY or oracle.api_key)");
            }
            Ok(Arc::new(OpenAiOracle::new(cfg, http)))
        }
        other => Err(anyhow!("unsupported oracle provider: {other}")),
    }
}

/// OpenAI-compatible Chat Completions client.
pub struct OpenAiOracle {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiOracle {
    pub fn new(cfg: &OracleConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            endpoint: cfg.endpoint.clone(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
        }
    }
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn complete(&self, prompt: &OraclePrompt) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &prompt.system,
                },
                Msg {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: 0.0,
            max_tokens: self.max_tokens,
        };

        counter!("classify_oracle_calls_total").increment(1);
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("oracle post()")?;

        let status = resp.status();
        if !status.is_success() {
            counter!("classify_oracle_errors_total").increment(1);
            bail!("oracle answered HTTP {status}");
        }
        let body: Resp = resp.json().await.context("decoding oracle response")?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        Ok(content)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Always answers with the same text; used for local runs and tests.
#[derive(Clone)]
pub struct StaticOracle {
    pub reply: String,
}

impl StaticOracle {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl Oracle for StaticOracle {
    async fn complete(&self, _prompt: &OraclePrompt) -> Result<String> {
        Ok(self.reply.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }

    fn caches_replies(&self) -> bool {
        false
    }
}
