//! MCP (Model Context Protocol) Server Implementation
//!
//! Exposes document upload and chat as MCP tools over JSON-RPC 2.0 on stdio.


pub mod protocol;
pub mod server;
pub mod tools;

pub use server::{ConnectionState, McpServer, ToolHandler};
pub use tools::{ChatHandler, UploadDocumentHandler};
