// Generation module
// Prompt construction and the ordered language model fallback chain


pub mod openai;
pub mod prompts;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::GenerationConfig;
pub use openai::ChatCompletionClient;
pub use prompts::DEFAULT_DOCUMENT_TITLE;

const SUMMARY_MARKERS: &[&str] = &["summarize", "summary", "overview", "main points"];

/// Which prompt pair a question is answered with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    QuestionAnswering,
    Summarization,
}

impl GenerationMode {
    /// Summarization when the question asks for a summary, overview or main points
    #[inline]
    pub fn detect(question: &str) -> Self {
        let lowered = question.to_lowercase();
        if SUMMARY_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            Self::Summarization
        } else {
            Self::QuestionAnswering
        }
    }
}

impl fmt::Display for GenerationMode {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::QuestionAnswering => write!(f, "question answering"),
            Self::Summarization => write!(f, "summarization"),
        }
    }
}

/// One chat completion call as sent to a model
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier used in logs and failure reports
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFailure {
    pub model: String,
    pub error: String,
}

impl fmt::Display for ModelFailure {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.model, self.error)
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("No language models are configured")]
    NoModels,
    #[error("Unable to generate response with any available model ({} failed)", failures.len())]
    Unavailable { failures: Vec<ModelFailure> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    /// Model that produced the answer
    pub model: String,
    pub mode: GenerationMode,
}

/// Sampling settings shared by every model in the chain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub answer_max_tokens: u32,
    pub summary_max_tokens: u32,
}

impl Default for SamplingSettings {
    #[inline]
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

impl From<&GenerationConfig> for SamplingSettings {
    #[inline]
    fn from(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            answer_max_tokens: config.answer_max_tokens,
            summary_max_tokens: config.summary_max_tokens,
        }
    }
}

impl SamplingSettings {
    #[inline]
    pub fn max_tokens(&self, mode: GenerationMode) -> u32 {
        match mode {
            GenerationMode::QuestionAnswering => self.answer_max_tokens,
            GenerationMode::Summarization => self.summary_max_tokens,
        }
    }
}

/// Tries each model in order with identical prompts until one answers
#[derive(Clone)]
pub struct FallbackChain {
    models: Vec<Arc<dyn LanguageModel>>,
    sampling: SamplingSettings,
}

impl fmt::Debug for FallbackChain {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackChain")
            .field("models", &self.model_names())
            .field("sampling", &self.sampling)
            .finish()
    }
}

impl FallbackChain {
    #[inline]
    pub fn new(models: Vec<Arc<dyn LanguageModel>>, sampling: SamplingSettings) -> Self {
        Self { models, sampling }
    }

    /// One chat completion client per configured model, in configured order
    #[inline]
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let models = config
            .models
            .iter()
            .map(|model| {
                ChatCompletionClient::new(config, model)
                    .map(|client| Arc::new(client) as Arc<dyn LanguageModel>)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(models, SamplingSettings::from(config)))
    }

    #[inline]
    pub fn model_names(&self) -> Vec<&str> {
        self.models.iter().map(|model| model.name()).collect()
    }

    /// Build the request for `question` over `context`
    #[inline]
    pub fn build_request(
        &self,
        context: &str,
        question: &str,
        title: Option<&str>,
    ) -> (GenerationMode, CompletionRequest) {
        let mode = GenerationMode::detect(question);
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_DOCUMENT_TITLE);

        let request = CompletionRequest {
            system_prompt: prompts::system_prompt(mode, title),
            user_prompt: prompts::user_prompt(mode, title, question, context),
            temperature: self.sampling.temperature,
            top_p: self.sampling.top_p,
            max_tokens: self.sampling.max_tokens(mode),
        };
        (mode, request)
    }

    #[inline]
    pub async fn generate(
        &self,
        context: &str,
        question: &str,
        title: Option<&str>,
    ) -> Result<Answer, GenerationError> {
        if self.models.is_empty() {
            return Err(GenerationError::NoModels);
        }

        let (mode, request) = self.build_request(context, question, title);
        debug!("Generating {} answer", mode);

        let mut failures = Vec::new();
        for model in &self.models {
            debug!("Using model: {}", model.name());
            match model.complete(&request).await {
                Ok(text) => {
                    info!("Response generated by {}", model.name());
                    return Ok(Answer {
                        text,
                        model: model.name().to_string(),
                        mode,
                    });
                }
                Err(e) => {
                    warn!("Error with model {}: {:#}", model.name(), e);
                    failures.push(ModelFailure {
                        model: model.name().to_string(),
                        error: format!("{:#}", e),
                    });
                }
            }
        }

        Err(GenerationError::Unavailable { failures })
    }
}
