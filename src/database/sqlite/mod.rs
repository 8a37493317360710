use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{Document, NewDocument};
use crate::database::sqlite::queries::DocumentQueries;


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

/// SQLite registry of ingested documents and the active-document pointer
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_url: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_url)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    #[inline]
    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(config_dir.join("metadata.db")).await
    }

    /// Record a successful ingestion and make it the active document
    #[inline]
    pub async fn record_ingestion(&self, document: NewDocument) -> Result<Document> {
        DocumentQueries::record_ingestion(&self.pool, document).await
    }

    #[inline]
    pub async fn active_document(&self) -> Result<Option<Document>> {
        DocumentQueries::active(&self.pool).await
    }

    #[inline]
    pub async fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
        DocumentQueries::get_by_document_id(&self.pool, document_id).await
    }

    #[inline]
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        DocumentQueries::list_all(&self.pool).await
    }
}
