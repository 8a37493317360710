use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::chat::{ChatRequest, ChatService};
use crate::config::Config;
use crate::database::lancedb::LanceVectorIndex;
use crate::database::{Database, VectorIndex};
use crate::embeddings::{Embedder, InferenceClient};
use crate::generation::FallbackChain;
use crate::indexer::DocumentIndexer;
use crate::mcp::{ChatHandler, McpServer, UploadDocumentHandler};
use crate::retrieval::Retriever;

/// Everything a command needs, wired from one configuration
pub struct Services {
    pub config: Config,
    pub registry: Database,
    pub index: Arc<dyn VectorIndex>,
    pub indexer: DocumentIndexer,
    pub chat: ChatService,
}

impl Services {
    #[inline]
    pub async fn from_config(config: Config) -> Result<Self> {
        let registry = Database::initialize_from_config_dir(config.get_base_dir())
            .await
            .context("Failed to initialize document registry")?;

        let dimension = config.embedding.dimension as usize;
        let index: Arc<dyn VectorIndex> = Arc::new(
            LanceVectorIndex::open(&config.vector_database_path(), dimension)
                .await
                .context("Failed to open vector index")?,
        );

        let client = InferenceClient::new(&config.embedding)
            .context("Failed to create embedding client")?;
        let embedder = Embedder::new(Arc::new(client), dimension);

        let chain = FallbackChain::from_config(&config.generation)
            .context("Failed to create language model clients")?;

        let indexer = DocumentIndexer::new(
            embedder.clone(),
            Arc::clone(&index),
            Some(registry.clone()),
            config.chunking.clone(),
        );
        let retriever = Retriever::new(
            embedder,
            Arc::clone(&index),
            Some(registry.clone()),
            config.retrieval.clone(),
        );

        Ok(Self {
            chat: ChatService::new(retriever, chain),
            config,
            registry,
            index,
            indexer,
        })
    }

    #[inline]
    pub async fn load(config_dir: &Path) -> Result<Self> {
        let config = Config::load(config_dir).context("Failed to load configuration")?;
        Self::from_config(config).await
    }
}

fn warn_missing_keys(config: &Config) {
    if config.embedding.api_key().is_none() {
        warn!(
            "{} is not set; embedding requests are sent without credentials",
            config.embedding.api_key_env
        );
    }
    if config.generation.api_key().is_none() {
        warn!(
            "{} is not set; generation requests are sent without credentials",
            config.generation.api_key_env
        );
    }
}

/// Ingest a PDF from disk as the new active document
#[inline]
pub async fn ingest_document(config_dir: &Path, path: &Path, name: Option<String>) -> Result<()> {
    let services = Services::load(config_dir).await?;
    warn_missing_keys(&services.config);

    let filename = name
        .filter(|n| !n.trim().is_empty())
        .or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .context("Cannot determine a file name for the document")?;

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    info!("Ingesting {} from {}", filename, path.display());
    let report = services
        .indexer
        .ingest(&bytes, &filename)
        .await
        .with_context(|| format!("Failed to ingest {}", path.display()))?;

    println!("Document ingested: {}", report.filename);
    println!("  Document ID: {}", report.document_id);
    println!(
        "  Chunks stored: {}/{}",
        report.stored_count, report.chunk_count
    );
    if report.degraded_embeddings > 0 {
        println!(
            "  ⚠️  {} chunks were embedded with random values; retrieval quality will suffer",
            report.degraded_embeddings
        );
    }
    if !report.index_cleared {
        println!("  ⚠️  The previous document could not be removed from the index");
    }

    Ok(())
}

/// Answer a single question and print the response
#[inline]
pub async fn ask(
    config_dir: &Path,
    message: String,
    document_id: Option<String>,
    title: Option<String>,
    no_document: bool,
) -> Result<()> {
    let services = Services::load(config_dir).await?;
    warn_missing_keys(&services.config);

    let request = ChatRequest {
        message: Some(message),
        has_pdf: !no_document,
        pdf_title: title,
        document_id,
    };

    let response = services.chat.chat(&request).await?;
    info!("Chat outcome: {:?}", response.outcome);
    println!("{}", response.response);

    Ok(())
}

/// Show the active document and the size of the index
#[inline]
pub async fn show_status(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).unwrap_or_else(|e| {
        warn!("Using default configuration: {:#}", e);
        Config {
            base_dir: config_dir.to_path_buf(),
            ..Config::default()
        }
    });

    println!("📊 Doc QA Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🗄️  Document Registry:");
    match Database::initialize_from_config_dir(config.get_base_dir()).await {
        Ok(registry) => {
            println!("   ✅ SQLite: {}", config.database_path().display());
            print_documents(&registry).await;
        }
        Err(e) => println!("   ❌ SQLite: Failed to open - {:#}", e),
    }

    println!();
    println!("🔍 Vector Index:");
    let dimension = config.embedding.dimension as usize;
    match LanceVectorIndex::open(&config.vector_database_path(), dimension).await {
        Ok(index) => match index.count().await {
            Ok(count) => {
                println!("   ✅ LanceDB: {}", config.vector_database_path().display());
                println!("   📦 Vectors: {} ({} dimensions)", count, dimension);
            }
            Err(e) => println!("   ⚠️  LanceDB: Opened but count failed - {}", e),
        },
        Err(e) => println!("   ❌ LanceDB: Failed to open - {}", e),
    }

    println!();
    println!("🤖 Providers:");
    println!("   Embedding: {}", config.embedding.endpoint);
    println!(
        "   Models: {} via {}",
        config.generation.models.join(" → "),
        config.generation.base_url
    );

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'doc-qa ingest <file.pdf>' to upload a document");
    println!("   • Use 'doc-qa ask \"<question>\"' to ask about it");
    println!("   • Use 'doc-qa serve' to start the MCP server for AI assistants");

    Ok(())
}

async fn print_documents(registry: &Database) {
    match registry.active_document().await {
        Ok(Some(document)) => {
            println!("   📄 Active: {} ({})", document.filename, document.document_id);
            println!(
                "      Uploaded {} ({})",
                document.age_description(Utc::now()),
                document.uploaded_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!("      Chunks: {}", document.chunk_count);
        }
        Ok(None) => println!("   📭 No document uploaded yet"),
        Err(e) => println!("   ❌ Failed to read active document: {:#}", e),
    }

    match registry.list_documents().await {
        Ok(documents) => println!("   🗂️  Uploads recorded: {}", documents.len()),
        Err(e) => println!("   ❌ Failed to list documents: {:#}", e),
    }
}

/// Start the MCP server on stdio
#[inline]
pub async fn serve_mcp(config_dir: &Path) -> Result<()> {
    let services = Services::load(config_dir).await?;
    warn_missing_keys(&services.config);

    let Services { indexer, chat, .. } = services;

    let server = Arc::new(
        McpServer::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")).with_instructions(
            "Upload a PDF with upload_document, then ask about it with chat (hasPdf: true)",
        ),
    );
    server
        .register_tool(UploadDocumentHandler::new(Arc::new(indexer)))
        .await;
    server.register_tool(ChatHandler::new(Arc::new(chat))).await;

    info!(
        "MCP server initialized with tools: {}",
        server.tool_names().await.join(", ")
    );

    tokio::select! {
        result = Arc::clone(&server).serve_stdio() => {
            if let Err(e) = &result {
                error!("MCP server error: {:#}", e);
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt signal, shutting down");
            Ok(())
        }
    }
}
