// Blocking JSON-over-HTTP client shared by the embedding and generation adapters
//
// Every request is sent exactly once. Callers own the failure policy: the
// embedder degrades to a random vector and the generation chain moves on to
// the next model.


use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct JsonHttpClient {
    agent: ureq::Agent,
    api_key: Option<String>,
}

impl JsonHttpClient {
    #[inline]
    pub fn new(timeout: Duration, api_key: Option<String>) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self { agent, api_key }
    }

    /// POST a JSON body and return the raw response text
    #[inline]
    pub fn post_json<T: Serialize + ?Sized>(&self, url: &Url, body: &T) -> Result<String> {
        let request_json = serde_json::to_string(body).context("Failed to serialize request")?;
        debug!("HTTP POST to {}", url);

        let mut request = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", &format!("Bearer {}", api_key));
        }

        request
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|error| describe_error(url, error))
    }
}

fn describe_error(url: &Url, error: ureq::Error) -> anyhow::Error {
    match error {
        ureq::Error::StatusCode(status) if status >= 500 || status == 429 => {
            warn!("Server error (status {}) from {}", status, url);
            anyhow::anyhow!("Server error: HTTP {}", status)
        }
        ureq::Error::StatusCode(status) => {
            warn!("Client error (status {}) from {}", status, url);
            anyhow::anyhow!("Client error: HTTP {}", status)
        }
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => {
            warn!("Transport error talking to {}: {}", url, error);
            anyhow::anyhow!("Transport error: {}", error)
        }
        other => {
            warn!("Request to {} failed: {}", url, other);
            anyhow::anyhow!("Request error: {}", other)
        }
    }
}
