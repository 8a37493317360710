#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;
use crate::embeddings::embedder::DEFAULT_EMBEDDING_DIMENSION;
use crate::retrieval::RetrievalConfig;

const APP_DIR_NAME: &str = "doc-qa";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Settings for the feature-extraction endpoint used to embed chunks and queries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    /// Name of the environment variable holding the bearer token
    pub api_key_env: String,
    /// Dimension of every vector written to the index
    pub dimension: u32,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api-inference.huggingface.co/models/sentence-transformers/distilbert-base-nli-mean-tokens".to_string(),
            api_key_env: "HUGGINGFACE_API_KEY".to_string(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            timeout_seconds: 30,
        }
    }
}

/// Settings for the OpenAI-compatible chat completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: String,
    pub api_key_env: String,
    /// Models tried in order until one answers
    pub models: Vec<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub answer_max_tokens: u32,
    pub summary_max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            models: vec![
                "claude-3-opus-20240229".to_string(),
                "llama3-70b-8192".to_string(),
                "claude-3-sonnet-20240229".to_string(),
                "claude-3-haiku-20240307".to_string(),
            ],
            temperature: 0.01,
            top_p: 0.95,
            answer_max_tokens: 1500,
            summary_max_tokens: 2000,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid API key variable name: {0:?} (cannot be empty)")]
    InvalidApiKeyEnv(String),
    #[error("At least one generation model must be configured")]
    NoModels,
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid temperature: {0} (must be between 0 and 2)")]
    InvalidTemperature(f32),
    #[error("Invalid top_p: {0} (must be greater than 0 and at most 1)")]
    InvalidTopP(f32),
    #[error("Invalid max tokens: {0} (must be between 1 and 32768)")]
    InvalidMaxTokens(u32),
    #[error("Invalid chunk max length: {0} (must be between 20 and 10000 characters)")]
    InvalidChunkLength(usize),
    #[error("Invalid overlap: {0} words (must be at most 1000)")]
    InvalidOverlap(usize),
    #[error("Invalid top-k: {0} (must be between 1 and 1000)")]
    InvalidTopK(usize),
    #[error("Invalid keyword count: {0} (must be at most 10)")]
    InvalidKeywordCount(usize),
    #[error("Invalid context limit: {0} (must be between 1 and 200)")]
    InvalidContextLimit(usize),
    #[error("High relevance count ({0}) cannot exceed the context limit ({1})")]
    HighRelevanceExceedsLimit(usize, usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            base_dir: Self::default_dir().unwrap_or_else(|_| PathBuf::from(".doc-qa")),
        }
    }
}

impl Config {
    /// Platform configuration directory for the application
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.generation.validate()?;
        self.validate_chunking_config()?;
        self.retrieval.validate()?;
        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        let config = &self.chunking;

        if !(20..=10_000).contains(&config.max_length) {
            return Err(ConfigError::InvalidChunkLength(config.max_length));
        }

        if config.overlap_words > 1000 {
            return Err(ConfigError::InvalidOverlap(config.overlap_words));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Get the path for the SQLite document registry
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.get_base_dir().join("metadata.db")
    }

    /// Get the path for the vector database directory
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.get_base_dir().join("vectors")
    }
}

fn validate_http_url(url_str: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(url_str).map_err(|_| ConfigError::InvalidUrl(url_str.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
    }
    Ok(url)
}

fn validate_timeout(timeout_seconds: u64) -> Result<(), ConfigError> {
    if !(1..=600).contains(&timeout_seconds) {
        return Err(ConfigError::InvalidTimeout(timeout_seconds));
    }
    Ok(())
}

fn read_api_key(variable: &str) -> Option<String> {
    env::var(variable)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

impl EmbeddingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url(&self.endpoint)?;
        validate_timeout(self.timeout_seconds)?;

        if self.api_key_env.trim().is_empty() {
            return Err(ConfigError::InvalidApiKeyEnv(self.api_key_env.clone()));
        }

        if !(64..=4096).contains(&self.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
        }

        Ok(())
    }

    #[inline]
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        validate_http_url(&self.endpoint)
    }

    /// Bearer token read from the configured environment variable, if set
    #[inline]
    pub fn api_key(&self) -> Option<String> {
        read_api_key(&self.api_key_env)
    }

    #[inline]
    pub fn set_endpoint(&mut self, endpoint: String) -> Result<(), ConfigError> {
        validate_http_url(&endpoint)?;
        self.endpoint = endpoint;
        Ok(())
    }

    #[inline]
    pub fn set_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(64..=4096).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.dimension = dimension;
        Ok(())
    }

    #[inline]
    pub fn set_api_key_env(&mut self, variable: String) -> Result<(), ConfigError> {
        if variable.trim().is_empty() {
            return Err(ConfigError::InvalidApiKeyEnv(variable));
        }
        self.api_key_env = variable;
        Ok(())
    }
}

impl GenerationConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url(&self.base_url)?;
        validate_timeout(self.timeout_seconds)?;

        if self.api_key_env.trim().is_empty() {
            return Err(ConfigError::InvalidApiKeyEnv(self.api_key_env.clone()));
        }

        if self.models.is_empty() {
            return Err(ConfigError::NoModels);
        }

        if let Some(model) = self.models.iter().find(|m| m.trim().is_empty()) {
            return Err(ConfigError::InvalidModel(model.clone()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        if self.top_p <= 0.0 || self.top_p > 1.0 {
            return Err(ConfigError::InvalidTopP(self.top_p));
        }

        for max_tokens in [self.answer_max_tokens, self.summary_max_tokens] {
            if !(1..=32_768).contains(&max_tokens) {
                return Err(ConfigError::InvalidMaxTokens(max_tokens));
            }
        }

        Ok(())
    }

    #[inline]
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        validate_http_url(&self.base_url)
    }

    #[inline]
    pub fn api_key(&self) -> Option<String> {
        read_api_key(&self.api_key_env)
    }

    #[inline]
    pub fn set_base_url(&mut self, base_url: String) -> Result<(), ConfigError> {
        validate_http_url(&base_url)?;
        self.base_url = base_url;
        Ok(())
    }

    #[inline]
    pub fn set_api_key_env(&mut self, variable: String) -> Result<(), ConfigError> {
        if variable.trim().is_empty() {
            return Err(ConfigError::InvalidApiKeyEnv(variable));
        }
        self.api_key_env = variable;
        Ok(())
    }

    #[inline]
    pub fn set_models(&mut self, models: Vec<String>) -> Result<(), ConfigError> {
        if models.is_empty() {
            return Err(ConfigError::NoModels);
        }
        if let Some(model) = models.iter().find(|m| m.trim().is_empty()) {
            return Err(ConfigError::InvalidModel(model.clone()));
        }
        self.models = models;
        Ok(())
    }
}
