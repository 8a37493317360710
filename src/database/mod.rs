// Database module
// Vector index backends (LanceDB, in-memory) and the SQLite document registry


pub mod lancedb;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use sqlite::Database;

/// Metadata stored alongside every chunk vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    /// The chunk text
    pub text: String,
    /// Document the chunk was extracted from
    pub document_id: String,
    pub filename: String,
    /// Ingestion time of the document
    pub timestamp: DateTime<Utc>,
}

/// One chunk vector as written to the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique per chunk: `chunk-<millis>-<index>`
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

impl VectorRecord {
    /// Build the record id for chunk `index` of an ingestion started at `ingested_at`
    #[inline]
    pub fn chunk_id(ingested_at: DateTime<Utc>, index: usize) -> String {
        format!("chunk-{}-{}", ingested_at.timestamp_millis(), index)
    }
}

/// A similarity query hit; higher scores are more similar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub score: f32,
    pub metadata: RecordMetadata,
}

/// Restricts queries to the chunks of a single document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    pub document_id: String,
}

impl RecordFilter {
    #[inline]
    pub fn document(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
        }
    }

    #[inline]
    pub fn matches(&self, metadata: &RecordMetadata) -> bool {
        metadata.document_id == self.document_id
    }

    /// SQL predicate form used by the LanceDB backend
    #[inline]
    pub fn to_sql(&self) -> String {
        format!("document_id = {}", sql_string_literal(&self.document_id))
    }
}

/// Quote a value as a SQL string literal, doubling embedded single quotes
#[inline]
pub fn sql_string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Storage for chunk vectors with similarity search
///
/// The index holds the chunks of at most one document at a time; callers clear
/// it with [`VectorIndex::delete_all`] before writing a new document.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Dimension every stored vector must have
    fn dimension(&self) -> usize;

    /// Insert or replace records by id
    async fn upsert_all(&self, records: &[VectorRecord]) -> crate::Result<()>;

    /// Remove every record unconditionally
    async fn delete_all(&self) -> crate::Result<()>;

    /// Up to `top_k` matches ordered by descending score
    async fn query(
        &self,
        vector: &[f32],
        filter: Option<&RecordFilter>,
        top_k: usize,
    ) -> crate::Result<Vec<Match>>;

    async fn fetch_by_ids(&self, ids: &[String]) -> crate::Result<Vec<VectorRecord>>;

    async fn count(&self) -> crate::Result<u64>;

    /// Number of records that pass `filter`
    async fn count_matching(&self, filter: &RecordFilter) -> crate::Result<u64>;
}
