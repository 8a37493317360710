// Indexer module
// Ingestion pipeline: extract, chunk, embed and store a document as the index's only content


use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::database::sqlite::models::NewDocument;
use crate::database::{Database, RecordMetadata, VectorIndex, VectorRecord};
use crate::embeddings::chunking::{ChunkingConfig, chunk_text};
use crate::embeddings::Embedder;
use crate::extract::{ExtractionError, extract_text};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("No PDF file uploaded")]
    NoFile,
    #[error("Failed to extract text from document: {0}")]
    ExtractionFailed(#[from] ExtractionError),
    #[error("No vectors were successfully stored in the index ({attempted} attempted)")]
    NothingStored { attempted: usize },
}

/// Summary of a successful ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionReport {
    pub document_id: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub chunk_count: usize,
    pub stored_count: usize,
    /// Chunks embedded with random filler because the provider failed
    pub degraded_embeddings: usize,
    /// False when clearing the previous document failed
    pub index_cleared: bool,
}

pub struct DocumentIndexer {
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    registry: Option<Database>,
    chunking: ChunkingConfig,
}

impl std::fmt::Debug for DocumentIndexer {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIndexer")
            .field("embedder", &self.embedder)
            .field("chunking", &self.chunking)
            .finish_non_exhaustive()
    }
}

impl DocumentIndexer {
    #[inline]
    pub fn new(
        embedder: Embedder,
        index: Arc<dyn VectorIndex>,
        registry: Option<Database>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            registry,
            chunking,
        }
    }

    /// Ingest an uploaded PDF, replacing whatever the index held before
    #[inline]
    pub async fn ingest(
        &self,
        bytes: &[u8],
        filename: &str,
    ) -> Result<IngestionReport, IngestError> {
        if bytes.is_empty() {
            return Err(IngestError::NoFile);
        }

        info!("Ingesting {} ({} bytes)", filename, bytes.len());

        let document_id = Uuid::new_v4().to_string();
        let index_cleared = self.clear_index().await;

        let text = extract_text(bytes, filename).inspect_err(|e| {
            error!("Extraction failed for {}: {}", filename, e);
        })?;

        self.store_document(document_id, &text, filename, index_cleared)
            .await
    }

    /// Ingest already extracted text, replacing whatever the index held before
    #[inline]
    pub async fn ingest_text(
        &self,
        text: &str,
        filename: &str,
    ) -> Result<IngestionReport, IngestError> {
        let document_id = Uuid::new_v4().to_string();
        let index_cleared = self.clear_index().await;
        self.store_document(document_id, text, filename, index_cleared)
            .await
    }

    async fn clear_index(&self) -> bool {
        debug!("Deleting all existing vectors from the index");
        match self.index.delete_all().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to clear index, continuing with upload: {}", e);
                false
            }
        }
    }

    async fn store_document(
        &self,
        document_id: String,
        text: &str,
        filename: &str,
        index_cleared: bool,
    ) -> Result<IngestionReport, IngestError> {
        let chunks = chunk_text(text, &self.chunking);
        if chunks.is_empty() {
            return Err(IngestError::NothingStored { attempted: 0 });
        }

        let uploaded_at = Utc::now();
        let mut records = Vec::with_capacity(chunks.len());
        let mut degraded_embeddings = 0;

        for chunk in &chunks {
            let embedding = self.embedder.embed(&chunk.text).await;
            if embedding.is_degraded() {
                degraded_embeddings += 1;
            }

            records.push(VectorRecord {
                id: VectorRecord::chunk_id(uploaded_at, chunk.sequence_index),
                values: embedding.values,
                metadata: RecordMetadata {
                    text: chunk.text.clone(),
                    document_id: document_id.clone(),
                    filename: filename.to_string(),
                    timestamp: uploaded_at,
                },
            });
        }

        if degraded_embeddings > 0 {
            warn!(
                "{} of {} chunks were embedded with random values",
                degraded_embeddings,
                records.len()
            );
        }

        let stored_count = self.upsert_with_fallback(&records).await;
        if stored_count == 0 {
            error!("No vectors were stored for {}", filename);
            return Err(IngestError::NothingStored {
                attempted: records.len(),
            });
        }

        self.record_document(&document_id, filename, uploaded_at, stored_count)
            .await;

        info!(
            "Stored {}/{} chunks of {} as document {}",
            stored_count,
            records.len(),
            filename,
            document_id
        );

        Ok(IngestionReport {
            document_id,
            filename: filename.to_string(),
            uploaded_at,
            chunk_count: records.len(),
            stored_count,
            degraded_embeddings,
            index_cleared,
        })
    }

    /// Upsert as one batch; on failure retry every record on its own
    async fn upsert_with_fallback(&self, records: &[VectorRecord]) -> usize {
        match self.index.upsert_all(records).await {
            Ok(()) => return records.len(),
            Err(e) => warn!("Batch upsert failed, retrying records individually: {}", e),
        }

        let mut stored = 0;
        for record in records {
            match self.index.upsert_all(std::slice::from_ref(record)).await {
                Ok(()) => stored += 1,
                Err(e) => warn!("Failed to upsert vector {}: {}", record.id, e),
            }
        }

        debug!(
            "Individual upserts completed, {} of {} stored",
            stored,
            records.len()
        );
        stored
    }

    async fn record_document(
        &self,
        document_id: &str,
        filename: &str,
        uploaded_at: DateTime<Utc>,
        stored_count: usize,
    ) {
        let Some(registry) = &self.registry else {
            return;
        };

        let new_document = NewDocument {
            document_id: document_id.to_string(),
            filename: filename.to_string(),
            uploaded_at,
            chunk_count: i64::try_from(stored_count).unwrap_or(i64::MAX),
        };

        if let Err(e) = registry.record_ingestion(new_document).await {
            warn!(
                "Failed to record {} as the active document: {:#}",
                document_id, e
            );
        }
    }
}
