#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! MCP Server Integration Tests
//!
//! Drives a server with the real upload and chat tools through its
//! line-delimited transport, the same way an MCP client talks to `doc-qa serve`.

use async_trait::async_trait;
use doc_qa::chat::ChatService;
use doc_qa::database::VectorIndex;
use doc_qa::database::memory::MemoryVectorIndex;
use doc_qa::embeddings::chunking::ChunkingConfig;
use doc_qa::embeddings::{Embedder, EmbeddingProvider, RawEmbedding};
use doc_qa::faq::lookup_faq;
use doc_qa::generation::{FallbackChain, SamplingSettings};
use doc_qa::indexer::DocumentIndexer;
use doc_qa::mcp::{ChatHandler, ConnectionState, McpServer, UploadDocumentHandler};
use doc_qa::retrieval::{RetrievalConfig, Retriever};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;

const DIMENSION: usize = 8;

struct ConstantProvider;

#[async_trait]
impl EmbeddingProvider for ConstantProvider {
    async fn embed_raw(&self, _text: &str) -> anyhow::Result<RawEmbedding> {
        Ok(RawEmbedding::Flat(vec![0.5; DIMENSION]))
    }
}

async fn document_server() -> McpServer {
    let index: Arc<dyn VectorIndex> = Arc::new(MemoryVectorIndex::new(DIMENSION));
    let embedder = Embedder::new(Arc::new(ConstantProvider), DIMENSION);

    let indexer = DocumentIndexer::new(
        embedder.clone(),
        Arc::clone(&index),
        None,
        ChunkingConfig::default(),
    );
    let chat = ChatService::new(
        Retriever::new(embedder, index, None, RetrievalConfig::default()),
        FallbackChain::new(Vec::new(), SamplingSettings::default()),
    );

    let server = McpServer::new("doc-qa", "0.1.0");
    server
        .register_tool(UploadDocumentHandler::new(Arc::new(indexer)))
        .await;
    server.register_tool(ChatHandler::new(Arc::new(chat))).await;
    server
}

async fn exchange(server: &McpServer, requests: &[Value]) -> Vec<Value> {
    let input: String = requests
        .iter()
        .map(|request| format!("{}\n", request))
        .collect();
    let mut output = Vec::new();

    server
        .serve(input.as_bytes(), &mut output)
        .await
        .expect("serve should finish at EOF");

    String::from_utf8(output)
        .expect("utf-8 output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each reply is one JSON line"))
        .collect()
}

fn initialize(id: i64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-06-18",
            "capabilities": {},
            "clientInfo": {"name": "integration-test", "version": "1.0"}
        }
    })
}

fn call(id: i64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    })
}

#[tokio::test]
async fn full_session_lists_both_tools() {
    let server = document_server().await;

    let replies = exchange(
        &server,
        &[
            initialize(1),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "ping"}),
        ],
    )
    .await;

    assert_eq!(replies.len(), 3);
    assert_eq!(replies[0]["result"]["serverInfo"]["name"], "doc-qa");

    let names: Vec<&str> = replies[1]["result"]["tools"]
        .as_array()
        .expect("tools array")
        .iter()
        .filter_map(|tool| tool["name"].as_str())
        .collect();
    assert_eq!(names, vec!["chat", "upload_document"]);

    assert_eq!(replies[2]["id"], 3);
    assert_eq!(server.connection_state().await, ConnectionState::Closed);
}

#[tokio::test]
async fn chat_tool_answers_faq_and_reports_missing_message() {
    let server = document_server().await;

    let replies = exchange(
        &server,
        &[
            initialize(1),
            call(2, "chat", json!({"message": "How does PakTeKHire work"})),
            call(3, "chat", json!({"hasPdf": true})),
        ],
    )
    .await;

    let answer = &replies[1]["result"];
    assert_eq!(answer["isError"], false);
    assert_eq!(
        answer["content"][0]["text"].as_str(),
        lookup_faq("how does paktekhire work")
    );

    let missing = &replies[2]["result"];
    assert_eq!(missing["isError"], true);
    assert_eq!(missing["content"][0]["text"], "Message is required");
}

#[tokio::test]
async fn upload_tool_rejects_non_pdf_files() {
    let temp_dir = TempDir::new().expect("temp dir");
    let notes = temp_dir.path().join("notes.txt");
    std::fs::write(&notes, "not a pdf").expect("write notes");
    let disguised = temp_dir.path().join("disguised.pdf");
    std::fs::write(&disguised, "plain text with a pdf name").expect("write disguised");

    let server = document_server().await;
    let replies = exchange(
        &server,
        &[
            call(1, "upload_document", json!({"path": notes.display().to_string()})),
            call(2, "upload_document", json!({"path": disguised.display().to_string()})),
            call(3, "upload_document", json!({"path": temp_dir.path().join("absent.pdf").display().to_string()})),
        ],
    )
    .await;

    assert_eq!(replies.len(), 3);
    for reply in &replies {
        assert_eq!(reply["result"]["isError"], true, "reply: {}", reply);
    }
    let text = |i: usize| replies[i]["result"]["content"][0]["text"].as_str().unwrap_or_default().to_string();
    assert!(text(0).starts_with("Failed to extract text"));
    assert!(text(1).starts_with("Failed to extract text"));
    assert!(text(2).starts_with("Failed to read"));
}

#[tokio::test]
async fn unknown_tool_is_a_protocol_error() {
    let server = document_server().await;

    let replies = exchange(&server, &[call(1, "search_docs", json!({"query": "bolts"}))]).await;

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0]["error"]["code"], -32602);
    assert_eq!(replies[0]["id"], 1);
}
