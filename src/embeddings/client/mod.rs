
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::embedder::{EmbeddingProvider, RawEmbedding};
use crate::config::EmbeddingConfig;
use crate::http::JsonHttpClient;

#[derive(Debug, Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a str,
}

/// Client for a Hugging Face style feature-extraction endpoint
#[derive(Debug, Clone)]
pub struct InferenceClient {
    endpoint: Url,
    http: JsonHttpClient,
}

impl InferenceClient {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let endpoint = config
            .endpoint_url()
            .context("Failed to parse embedding endpoint from config")?;
        let http = JsonHttpClient::new(
            Duration::from_secs(config.timeout_seconds),
            config.api_key(),
        );

        Ok(Self { endpoint, http })
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Blocking request for the raw embedding of `text`
    #[inline]
    pub fn embed_blocking(&self, text: &str) -> Result<RawEmbedding> {
        debug!(
            "Requesting embedding for {} chars from {}",
            text.len(),
            self.endpoint
        );

        let response_text = self
            .http
            .post_json(&self.endpoint, &FeatureExtractionRequest { inputs: text })
            .context("Embedding request failed")?;

        serde_json::from_str(&response_text).context("Failed to parse embedding response")
    }
}

#[async_trait]
impl EmbeddingProvider for InferenceClient {
    #[inline]
    async fn embed_raw(&self, text: &str) -> Result<RawEmbedding> {
        let client = self.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || client.embed_blocking(&text))
            .await
            .context("Embedding task panicked")?
    }
}
