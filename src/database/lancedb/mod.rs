// LanceDB vector index
// Persists chunk vectors on disk and answers cosine similarity queries


use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Match, RecordFilter, RecordMetadata, VectorIndex, VectorRecord, sql_string_literal};
use crate::DocQaError;

const TABLE_NAME: &str = "chunks";

/// Vector index backed by a LanceDB table with a fixed vector dimension
pub struct LanceVectorIndex {
    connection: Connection,
    dimension: usize,
}

impl std::fmt::Debug for LanceVectorIndex {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceVectorIndex")
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl LanceVectorIndex {
    /// Open (or create) the index stored under `path`
    ///
    /// An existing table whose vector dimension differs from `dimension` is
    /// dropped and recreated empty.
    #[inline]
    pub async fn open(path: &Path, dimension: usize) -> crate::Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", path);

        std::fs::create_dir_all(path).map_err(|e| {
            DocQaError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = path.to_string_lossy();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        let index = Self {
            connection,
            dimension,
        };
        index.initialize_table().await?;

        info!("Vector index initialized with {} dimensions", dimension);
        Ok(index)
    }

    async fn initialize_table(&self) -> crate::Result<()> {
        if self.table_exists().await? {
            match self.existing_dimension().await? {
                Some(existing) if existing == self.dimension => return Ok(()),
                existing => {
                    warn!(
                        "Vector dimension changed from {:?} to {}, recreating table",
                        existing, self.dimension
                    );
                    self.drop_table().await?;
                }
            }
        }

        self.connection
            .create_empty_table(TABLE_NAME, self.schema())
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to create table: {}", e)))?;

        debug!("Created {} table", TABLE_NAME);
        Ok(())
    }

    async fn table_exists(&self) -> crate::Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to list tables: {}", e)))?;
        Ok(table_names.iter().any(|name| name == TABLE_NAME))
    }

    async fn existing_dimension(&self) -> crate::Result<Option<usize>> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to get table schema: {}", e)))?;

        Ok(schema
            .field_with_name("vector")
            .ok()
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            }))
    }

    async fn drop_table(&self) -> crate::Result<()> {
        self.connection
            .drop_table(TABLE_NAME)
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to drop table: {}", e)))
    }

    async fn open_table(&self) -> crate::Result<Table> {
        self.connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to open table: {}", e)))
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.list_size(),
                ),
                false,
            ),
            Field::new("text", DataType::Utf8, false),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("filename", DataType::Utf8, false),
            Field::new("timestamp", DataType::Utf8, false),
        ]))
    }

    fn list_size(&self) -> i32 {
        i32::try_from(self.dimension).unwrap_or(i32::MAX)
    }

    fn create_record_batch(&self, records: &[VectorRecord]) -> crate::Result<RecordBatch> {
        let mut flat_values = Vec::with_capacity(records.len() * self.dimension);
        for record in records {
            if record.values.len() != self.dimension {
                return Err(DocQaError::Database(format!(
                    "Record {} has {} values, index dimension is {}",
                    record.id,
                    record.values.len(),
                    self.dimension
                )));
            }
            flat_values.extend_from_slice(&record.values);
        }

        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::try_new(
            field,
            self.list_size(),
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| DocQaError::Database(format!("Failed to create vector array: {}", e)))?;

        let timestamps: Vec<String> = records
            .iter()
            .map(|r| r.metadata.timestamp.to_rfc3339())
            .collect();

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.id.as_str()))),
            Arc::new(vector_array),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.metadata.text.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.metadata.document_id.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.metadata.filename.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(timestamps)),
        ];

        RecordBatch::try_new(self.schema(), arrays)
            .map_err(|e| DocQaError::Database(format!("Failed to create record batch: {}", e)))
    }

    async fn collect_batches(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> crate::Result<Vec<RecordBatch>> {
        let mut batches = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to read result stream: {}", e)))?
        {
            batches.push(batch);
        }
        Ok(batches)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> crate::Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| DocQaError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| DocQaError::Database(format!("Invalid {} column type", name)))
}

fn parse_metadata(batch: &RecordBatch) -> crate::Result<Vec<(String, RecordMetadata)>> {
    let ids = string_column(batch, "id")?;
    let texts = string_column(batch, "text")?;
    let document_ids = string_column(batch, "document_id")?;
    let filenames = string_column(batch, "filename")?;
    let timestamps = string_column(batch, "timestamp")?;

    (0..batch.num_rows())
        .map(|row| {
            let timestamp = DateTime::parse_from_rfc3339(timestamps.value(row))
                .map_err(|e| DocQaError::Database(format!("Invalid timestamp: {}", e)))?
                .with_timezone(&Utc);
            Ok((
                ids.value(row).to_string(),
                RecordMetadata {
                    text: texts.value(row).to_string(),
                    document_id: document_ids.value(row).to_string(),
                    filename: filenames.value(row).to_string(),
                    timestamp,
                },
            ))
        })
        .collect()
}

fn parse_matches(batch: &RecordBatch) -> crate::Result<Vec<Match>> {
    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    Ok(parse_metadata(batch)?
        .into_iter()
        .enumerate()
        .map(|(row, (id, metadata))| {
            let distance =
                distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });
            Match {
                id,
                score: 1.0 - distance,
                metadata,
            }
        })
        .collect())
}

fn parse_records(batch: &RecordBatch) -> crate::Result<Vec<VectorRecord>> {
    let vectors = batch
        .column_by_name("vector")
        .ok_or_else(|| DocQaError::Database("Missing vector column".to_string()))?
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(|| DocQaError::Database("Invalid vector column type".to_string()))?;

    parse_metadata(batch)?
        .into_iter()
        .enumerate()
        .map(|(row, (id, metadata))| {
            let row_values = vectors.value(row);
            let values = row_values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| DocQaError::Database("Invalid vector value type".to_string()))?
                .values()
                .to_vec();
            Ok(VectorRecord {
                id,
                values,
                metadata,
            })
        })
        .collect()
}

#[async_trait]
impl VectorIndex for LanceVectorIndex {
    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    async fn upsert_all(&self, records: &[VectorRecord]) -> crate::Result<()> {
        if records.is_empty() {
            debug!("No records to upsert");
            return Ok(());
        }

        let batch = self.create_record_batch(records)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        let table = self.open_table().await?;
        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to upsert records: {}", e)))?;

        debug!("Upserted {} records", records.len());
        Ok(())
    }

    #[inline]
    async fn delete_all(&self) -> crate::Result<()> {
        self.open_table()
            .await?
            .delete("true")
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to clear index: {}", e)))?;

        info!("Cleared all records from vector index");
        Ok(())
    }

    #[inline]
    async fn query(
        &self,
        vector: &[f32],
        filter: Option<&RecordFilter>,
        top_k: usize,
    ) -> crate::Result<Vec<Match>> {
        debug!("Querying vector index with top_k {}", top_k);

        let table = self.open_table().await?;
        let mut query = table
            .vector_search(vector)
            .map_err(|e| DocQaError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(top_k);

        if let Some(filter) = filter {
            query = query.only_if(filter.to_sql());
        }

        let results = query
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to execute search: {}", e)))?;

        let mut matches = Vec::new();
        for batch in Self::collect_batches(results).await? {
            matches.extend(parse_matches(&batch)?);
        }
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!("Vector query returned {} matches", matches.len());
        Ok(matches)
    }

    #[inline]
    async fn fetch_by_ids(&self, ids: &[String]) -> crate::Result<Vec<VectorRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let id_list = ids
            .iter()
            .map(|id| sql_string_literal(id))
            .collect::<Vec<_>>()
            .join(", ");

        let results = self
            .open_table()
            .await?
            .query()
            .only_if(format!("id IN ({})", id_list))
            .limit(ids.len())
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to fetch records: {}", e)))?;

        let mut records = Vec::new();
        for batch in Self::collect_batches(results).await? {
            records.extend(parse_records(&batch)?);
        }
        Ok(records)
    }

    #[inline]
    async fn count(&self) -> crate::Result<u64> {
        let count = self
            .open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    #[inline]
    async fn count_matching(&self, filter: &RecordFilter) -> crate::Result<u64> {
        let count = self
            .open_table()
            .await?
            .count_rows(Some(filter.to_sql()))
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }
}
