//! MCP Server Implementation
//!
//! Line-delimited JSON-RPC over any async reader/writer pair, with stdio as the
//! production transport. Tool calls are dispatched to registered handlers.

use crate::mcp::protocol::*;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Connection state tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// Tool handler trait for implementing tool execution
///
/// Failures the client should see are returned as `CallToolResult::error`;
/// an `Err` becomes a JSON-RPC internal error.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> Tool;

    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult>;
}

pub struct McpServer {
    server_info: Implementation,
    instructions: Option<String>,
    tool_handlers: RwLock<BTreeMap<String, Arc<dyn ToolHandler>>>,
    connection_state: RwLock<ConnectionState>,
}

impl McpServer {
    #[inline]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            server_info: Implementation {
                name: name.into(),
                version: version.into(),
            },
            instructions: None,
            tool_handlers: RwLock::new(BTreeMap::new()),
            connection_state: RwLock::new(ConnectionState::Uninitialized),
        }
    }

    #[inline]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Register a tool; a handler with the same tool name is replaced
    #[inline]
    pub async fn register_tool<H>(&self, handler: H)
    where
        H: ToolHandler + 'static,
    {
        let name = handler.definition().name;
        self.tool_handlers
            .write()
            .await
            .insert(name.clone(), Arc::new(handler));
        debug!("Registered tool: {}", name);
    }

    #[inline]
    pub async fn tool_names(&self) -> Vec<String> {
        self.tool_handlers.read().await.keys().cloned().collect()
    }

    #[inline]
    pub async fn connection_state(&self) -> ConnectionState {
        *self.connection_state.read().await
    }

    /// Start the server using stdio transport
    #[inline]
    pub async fn serve_stdio(self: Arc<Self>) -> Result<()> {
        info!("Starting MCP server with stdio transport");
        self.serve(BufReader::new(io::stdin()), io::stdout()).await
    }

    /// Process newline-delimited messages until the reader is exhausted
    #[inline]
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("EOF reached, closing connection");
                    break;
                }
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    if let Some(reply) = self.handle_line(trimmed).await {
                        Self::send_message(&mut writer, &reply).await?;
                    }
                }
                Err(e) => {
                    error!("Error reading from input: {}", e);
                    break;
                }
            }
        }

        *self.connection_state.write().await = ConnectionState::Closed;
        info!("MCP server stopped");
        Ok(())
    }

    /// Handle one raw message; notifications produce no reply
    #[inline]
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcMessage> {
        let raw: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to parse JSON: {}", e);
                return Some(JsonRpcMessage::failure(None, JsonRpcError::parse_error()));
            }
        };

        let message = match serde_json::from_value::<JsonRpcMessage>(raw) {
            Ok(message) if message.version() == JSONRPC_VERSION => message,
            Ok(_) | Err(_) => {
                warn!("Rejected malformed JSON-RPC message");
                return Some(JsonRpcMessage::failure(None, JsonRpcError::invalid_request()));
            }
        };

        match message {
            JsonRpcMessage::Request(request) => Some(self.handle_request(request).await),
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(&notification).await;
                None
            }
            JsonRpcMessage::Response(_) | JsonRpcMessage::ErrorResponse(_) => {
                warn!("Received unexpected response message from client");
                None
            }
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcMessage {
        debug!("Handling request {}", request.method);
        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params).await,
            "tools/list" => self.handle_list_tools().await,
            "tools/call" => self.handle_call_tool(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            _ => Err(JsonRpcError::method_not_found()),
        };

        match result {
            Ok(result) => JsonRpcMessage::success(request.id, result),
            Err(error) => {
                if error.code != error_codes::METHOD_NOT_FOUND {
                    error!("Error handling request {}: {}", request.method, error.message);
                }
                JsonRpcMessage::failure(Some(request.id), error)
            }
        }
    }

    async fn handle_notification(&self, notification: &JsonRpcNotification) {
        match notification.method.as_str() {
            "notifications/initialized" | "initialized" => {
                *self.connection_state.write().await = ConnectionState::Ready;
                info!("Server ready to handle requests");
            }
            "notifications/cancelled" => debug!("Received cancellation notification"),
            other => warn!("Unknown notification method: {}", other),
        }
    }

    async fn handle_initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: InitializeParams = params
            .ok_or_else(|| {
                JsonRpcError::invalid_params("Initialize request missing parameters")
            })
            .and_then(|p| {
                serde_json::from_value(p)
                    .map_err(|e| JsonRpcError::invalid_params(e.to_string()))
            })?;

        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&params.protocol_version.as_str()) {
            return Err(JsonRpcError::invalid_params(format!(
                "Unsupported protocol version: {}. Supported: {}",
                params.protocol_version,
                SUPPORTED_PROTOCOL_VERSIONS.join(", ")
            )));
        }

        *self.connection_state.write().await = ConnectionState::Initializing;

        let result = InitializeResult {
            protocol_version: params.protocol_version,
            capabilities: serde_json::json!({"tools": {"listChanged": false}}),
            server_info: self.server_info.clone(),
            instructions: self.instructions.clone(),
        };

        info!("Client initialized: {}", params.client_info.name);
        to_result(&result)
    }

    async fn handle_list_tools(&self) -> Result<Value, JsonRpcError> {
        let tools = self
            .tool_handlers
            .read()
            .await
            .values()
            .map(|handler| handler.definition())
            .collect();

        to_result(&ListToolsResult { tools })
    }

    async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = params
            .ok_or_else(|| {
                JsonRpcError::invalid_params("Tool call request missing parameters")
            })
            .and_then(|p| {
                serde_json::from_value(p)
                    .map_err(|e| JsonRpcError::invalid_params(e.to_string()))
            })?;

        let handler = self
            .tool_handlers
            .read()
            .await
            .get(&params.name)
            .cloned()
            .ok_or_else(|| {
                JsonRpcError::invalid_params(format!("Tool not found: {}", params.name))
            })?;

        let result = handler
            .handle(params)
            .await
            .map_err(|e| JsonRpcError::internal_error(format!("{:#}", e)))?;
        to_result(&result)
    }

    async fn send_message<W>(writer: &mut W, message: &JsonRpcMessage) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let json = serde_json::to_string(message)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}
