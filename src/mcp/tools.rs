//! MCP Tools Implementation
//!
//! `upload_document` ingests a PDF from disk and `chat` answers a question
//! about it, or from the FAQ table when no document is involved.

use crate::chat::{ChatError, ChatRequest, ChatService};
use crate::faq::faq_questions;
use crate::indexer::DocumentIndexer;
use crate::mcp::protocol::*;
use crate::mcp::server::ToolHandler;
use anyhow::Result;
use async_trait::async_trait;
use itertools::Itertools;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error};

fn parse_arguments<T: DeserializeOwned>(
    arguments: Option<Map<String, Value>>,
) -> std::result::Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(arguments.unwrap_or_default()))
}

#[derive(Debug, Deserialize)]
struct UploadArguments {
    path: PathBuf,
    #[serde(default)]
    filename: Option<String>,
}

/// Name recorded for an upload: the explicit one, else the file name on disk
pub(crate) fn display_name(path: &Path, filename: Option<&str>) -> String {
    filename
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToString::to_string)
        .or_else(|| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "document.pdf".to_string())
}

pub struct UploadDocumentHandler {
    indexer: Arc<DocumentIndexer>,
}

impl UploadDocumentHandler {
    #[inline]
    pub fn new(indexer: Arc<DocumentIndexer>) -> Self {
        Self { indexer }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "upload_document".to_string(),
            description: Some(
                "Index a PDF from disk, replacing the previously uploaded document".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path of the PDF file to upload"
                    },
                    "filename": {
                        "type": "string",
                        "description": "Optional: Name to record instead of the file name"
                    }
                },
                "required": ["path"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for UploadDocumentHandler {
    #[inline]
    fn definition(&self) -> Tool {
        Self::tool_definition()
    }

    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args: UploadArguments = match parse_arguments(params.arguments) {
            Ok(args) => args,
            Err(e) => {
                return Ok(CallToolResult::error(format!("Invalid arguments: {}", e)));
            }
        };

        let filename = display_name(&args.path, args.filename.as_deref());
        debug!("Uploading {} as {}", args.path.display(), filename);

        let bytes = match tokio::fs::read(&args.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to read {}: {}", args.path.display(), e);
                return Ok(CallToolResult::error(format!(
                    "Failed to read {}: {}",
                    args.path.display(),
                    e
                )));
            }
        };

        match self.indexer.ingest(&bytes, &filename).await {
            Ok(report) => {
                let response = json!({
                    "success": true,
                    "documentId": report.document_id,
                    "filename": report.filename,
                    "chunkCount": report.chunk_count,
                    "storedCount": report.stored_count,
                    "degradedEmbeddings": report.degraded_embeddings,
                });
                Ok(CallToolResult::text(serde_json::to_string_pretty(
                    &response,
                )?))
            }
            Err(e) => {
                error!("Upload of {} failed: {}", filename, e);
                Ok(CallToolResult::error(e.to_string()))
            }
        }
    }
}

pub struct ChatHandler {
    chat: Arc<ChatService>,
}

impl ChatHandler {
    #[inline]
    pub fn new(chat: Arc<ChatService>) -> Self {
        Self { chat }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "chat".to_string(),
            description: Some(format!(
                "Ask a question about the uploaded document. Without a document (hasPdf false) \
                 only these questions have answers: {}",
                faq_questions().join("; ")
            )),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "The question to answer"
                    },
                    "hasPdf": {
                        "type": "boolean",
                        "description": "Optional: Answer from the uploaded document (default: false)"
                    },
                    "pdfTitle": {
                        "type": "string",
                        "description": "Optional: Title used to refer to the document"
                    },
                    "documentId": {
                        "type": "string",
                        "description": "Optional: Document to search instead of the active one"
                    }
                },
                "required": ["message"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for ChatHandler {
    #[inline]
    fn definition(&self) -> Tool {
        Self::tool_definition()
    }

    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let request: ChatRequest = match parse_arguments(params.arguments) {
            Ok(request) => request,
            Err(e) => {
                return Ok(CallToolResult::error(format!("Invalid arguments: {}", e)));
            }
        };

        match self.chat.chat(&request).await {
            Ok(response) => Ok(CallToolResult::text(response.response)),
            Err(ChatError::MissingMessage) => {
                Ok(CallToolResult::error(ChatError::MissingMessage.to_string()))
            }
        }
    }
}
