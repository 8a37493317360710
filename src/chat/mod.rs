// Chat module
// Routes a question to the FAQ table or through retrieval and generation


use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::faq::{answer_faq, lookup_faq};
use crate::generation::{DEFAULT_DOCUMENT_TITLE, FallbackChain};
use crate::retrieval::{Retrieval, Retriever};

pub const NO_MATCHES_RESPONSE: &str = "I've analyzed the document but couldn't find specific information related to your question. Please try a different question.";
pub const EMPTY_CONTEXT_RESPONSE: &str = "I've analyzed the document but couldn't extract meaningful content. Please upload the document again.";
pub const GENERATION_FAILED_RESPONSE: &str = "I encountered an error analyzing the document. Please try again with a different question.";
pub const SEARCH_FAILED_RESPONSE: &str = "I encountered a technical issue while searching through the document. Please try again.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    /// Whether the question is about an uploaded document
    #[serde(default)]
    pub has_pdf: bool,
    #[serde(default)]
    pub pdf_title: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
}

impl ChatRequest {
    #[inline]
    pub fn about_document(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            has_pdf: true,
            ..Self::default()
        }
    }

    #[inline]
    pub fn without_document(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// How a response was produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    FaqAnswer,
    FaqFallback,
    Answered { model: String },
    NoMatches,
    EmptyContext,
    GenerationFailed,
    SearchFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(skip)]
    pub outcome: ChatOutcome,
}

impl ChatResponse {
    fn new(response: impl Into<String>, outcome: ChatOutcome) -> Self {
        Self {
            response: response.into(),
            outcome,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("Message is required")]
    MissingMessage,
}

/// Answers chat requests; only a missing message is reported as an error
#[derive(Debug, Clone)]
pub struct ChatService {
    retriever: Retriever,
    generator: FallbackChain,
}

impl ChatService {
    #[inline]
    pub fn new(retriever: Retriever, generator: FallbackChain) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    #[inline]
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        let message = request
            .message
            .as_deref()
            .filter(|m| !m.is_empty())
            .ok_or(ChatError::MissingMessage)?;

        if !request.has_pdf {
            return Ok(Self::faq_response(message));
        }

        Ok(self
            .document_response(
                message,
                request.pdf_title.as_deref(),
                request.document_id.as_deref(),
            )
            .await)
    }

    fn faq_response(message: &str) -> ChatResponse {
        match lookup_faq(message) {
            Some(answer) => ChatResponse::new(answer, ChatOutcome::FaqAnswer),
            None => ChatResponse::new(answer_faq(message), ChatOutcome::FaqFallback),
        }
    }

    async fn document_response(
        &self,
        message: &str,
        title: Option<&str>,
        document_id: Option<&str>,
    ) -> ChatResponse {
        info!(
            "Processing query about {}: {:?}",
            title.unwrap_or(DEFAULT_DOCUMENT_TITLE),
            message
        );

        let context = match self.retriever.retrieve(message, document_id).await {
            Ok(Retrieval::Found(context)) => context,
            Ok(Retrieval::NoMatches) => {
                return ChatResponse::new(NO_MATCHES_RESPONSE, ChatOutcome::NoMatches);
            }
            Err(e) => {
                error!("Query error: {}", e);
                return ChatResponse::new(SEARCH_FAILED_RESPONSE, ChatOutcome::SearchFailed);
            }
        };

        if context.has_no_text() {
            warn!("Retrieved {} matches but none had text", context.len());
            return ChatResponse::new(EMPTY_CONTEXT_RESPONSE, ChatOutcome::EmptyContext);
        }
        let rendered = context.render();

        info!("Generating response with {} context sections", context.len());
        match self.generator.generate(&rendered, message, title).await {
            Ok(answer) => ChatResponse::new(
                answer.text,
                ChatOutcome::Answered {
                    model: answer.model,
                },
            ),
            Err(e) => {
                error!("Response generation failed: {}", e);
                ChatResponse::new(GENERATION_FAILED_RESPONSE, ChatOutcome::GenerationFailed)
            }
        }
    }
}
