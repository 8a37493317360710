
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{CompletionRequest, LanguageModel};
use crate::config::GenerationConfig;
use crate::http::JsonHttpClient;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// One model behind an OpenAI-compatible `/chat/completions` endpoint
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    endpoint: Url,
    model: String,
    http: JsonHttpClient,
}

impl ChatCompletionClient {
    #[inline]
    pub fn new(config: &GenerationConfig, model: &str) -> Result<Self> {
        let mut base_url = config
            .base_url()
            .context("Failed to parse generation base URL from config")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let endpoint = base_url
            .join("chat/completions")
            .context("Failed to build chat completions URL")?;

        let http = JsonHttpClient::new(
            Duration::from_secs(config.timeout_seconds),
            config.api_key(),
        );

        Ok(Self {
            endpoint,
            model: model.to_string(),
            http,
        })
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[inline]
    pub fn complete_blocking(&self, request: &CompletionRequest) -> Result<String> {
        debug!("Requesting completion from {} at {}", self.model, self.endpoint);

        let body = ChatCompletionBody {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
        };

        let response_text = self
            .http
            .post_json(&self.endpoint, &body)
            .with_context(|| format!("Completion request to {} failed", self.model))?;

        let response: ChatCompletionResponse = serde_json::from_str(&response_text)
            .context("Failed to parse chat completion response")?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("{} returned no completion content", self.model))
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionClient {
    #[inline]
    fn name(&self) -> &str {
        &self.model
    }

    #[inline]
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let client = self.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || client.complete_blocking(&request))
            .await
            .context("Completion task panicked")?
    }
}
