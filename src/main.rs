use clap::{Parser, Subcommand};
use doc_qa::Result;
use doc_qa::commands::{ask, ingest_document, serve_mcp, show_status};
use doc_qa::config::{Config, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "doc-qa")]
#[command(about = "Ask questions about an uploaded PDF, backed by a vector index and a model fallback chain")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml, the document registry and the vector index
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding and generation providers
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Upload a PDF, replacing the previously indexed document
    Ingest {
        /// Path of the PDF file
        path: PathBuf,
        /// Optional name to record instead of the file name
        #[arg(long)]
        name: Option<String>,
    },
    /// Ask a question about the uploaded document
    Ask {
        /// The question
        message: String,
        /// Search this document instead of the active one
        #[arg(long)]
        document_id: Option<String>,
        /// Title used to refer to the document in prompts
        #[arg(long)]
        title: Option<String>,
        /// Answer from the built-in FAQ instead of the document
        #[arg(long)]
        no_document: bool,
    },
    /// Show the active document and index status
    Status,
    /// Start MCP server on stdio
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => Config::default_dir().map_err(|e| doc_qa::DocQaError::Config(e.to_string()))?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Ingest { path, name } => {
            ingest_document(&config_dir, &path, name).await?;
        }
        Commands::Ask {
            message,
            document_id,
            title,
            no_document,
        } => {
            ask(&config_dir, message, document_id, title, no_document).await?;
        }
        Commands::Status => {
            show_status(&config_dir).await?;
        }
        Commands::Serve => {
            serve_mcp(&config_dir).await?;
        }
    }

    Ok(())
}
