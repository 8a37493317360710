
use super::models::{Document, NewDocument};
use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

const DOCUMENT_COLUMNS: &str = "id, document_id, filename, uploaded_at, chunk_count, is_active";

pub struct DocumentQueries;

impl DocumentQueries {
    /// Insert a document and make it the only active one
    ///
    /// Deactivation and insertion run in one transaction, so readers never see
    /// zero or two active documents mid-update.
    #[inline]
    pub async fn record_ingestion(pool: &SqlitePool, new_document: NewDocument) -> Result<Document> {
        let mut tx = pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query("UPDATE documents SET is_active = FALSE WHERE is_active = TRUE")
            .execute(&mut *tx)
            .await
            .context("Failed to deactivate previous documents")?;

        let id = sqlx::query(
            "INSERT INTO documents (document_id, filename, uploaded_at, chunk_count, is_active) VALUES (?, ?, ?, ?, TRUE)",
        )
        .bind(&new_document.document_id)
        .bind(&new_document.filename)
        .bind(new_document.uploaded_at)
        .bind(new_document.chunk_count)
        .execute(&mut *tx)
        .await
        .context("Failed to insert document")?
        .last_insert_rowid();

        tx.commit().await.context("Failed to commit document")?;

        debug!(
            "Recorded document {} ({}) as active",
            new_document.document_id, new_document.filename
        );

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve recorded document"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Document>> {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents WHERE id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get document by id")
    }

    #[inline]
    pub async fn get_by_document_id(
        pool: &SqlitePool,
        document_id: &str,
    ) -> Result<Option<Document>> {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents WHERE document_id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(document_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get document by document id")
    }

    #[inline]
    pub async fn active(pool: &SqlitePool) -> Result<Option<Document>> {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents WHERE is_active = TRUE ORDER BY id DESC LIMIT 1",
            DOCUMENT_COLUMNS
        ))
        .fetch_optional(pool)
        .await
        .context("Failed to get active document")
    }

    /// All documents, newest first
    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Document>> {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents ORDER BY id DESC",
            DOCUMENT_COLUMNS
        ))
        .fetch_all(pool)
        .await
        .context("Failed to list documents")
    }
}
