// In-memory vector index
// Exact cosine search over a map of records; nothing is persisted

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{Match, RecordFilter, VectorIndex, VectorRecord};
use crate::DocQaError;

#[derive(Debug)]
pub struct MemoryVectorIndex {
    dimension: usize,
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl MemoryVectorIndex {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: RwLock::new(HashMap::new()),
        }
    }
}

/// Cosine similarity; zero vectors score 0
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0_f32, 0.0_f32, 0.0_f32), |(dot, na, nb), (x, y)| {
            (x.mul_add(*y, dot), x.mul_add(*x, na), y.mul_add(*y, nb))
        });

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    async fn upsert_all(&self, records: &[VectorRecord]) -> crate::Result<()> {
        if let Some(bad) = records.iter().find(|r| r.values.len() != self.dimension) {
            return Err(DocQaError::Database(format!(
                "Record {} has {} values, index dimension is {}",
                bad.id,
                bad.values.len(),
                self.dimension
            )));
        }

        let mut stored = self.records.write().await;
        for record in records {
            stored.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    #[inline]
    async fn delete_all(&self) -> crate::Result<()> {
        self.records.write().await.clear();
        Ok(())
    }

    #[inline]
    async fn query(
        &self,
        vector: &[f32],
        filter: Option<&RecordFilter>,
        top_k: usize,
    ) -> crate::Result<Vec<Match>> {
        if vector.len() != self.dimension {
            return Err(DocQaError::Database(format!(
                "Query vector has {} values, index dimension is {}",
                vector.len(),
                self.dimension
            )));
        }

        let stored = self.records.read().await;
        let mut matches: Vec<Match> = stored
            .values()
            .filter(|record| filter.is_none_or(|f| f.matches(&record.metadata)))
            .map(|record| Match {
                id: record.id.clone(),
                score: cosine_similarity(vector, &record.values),
                metadata: record.metadata.clone(),
            })
            .collect();
        drop(stored);

        matches.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        matches.truncate(top_k);
        Ok(matches)
    }

    #[inline]
    async fn fetch_by_ids(&self, ids: &[String]) -> crate::Result<Vec<VectorRecord>> {
        let stored = self.records.read().await;
        Ok(ids.iter().filter_map(|id| stored.get(id).cloned()).collect())
    }

    #[inline]
    async fn count(&self) -> crate::Result<u64> {
        Ok(self.records.read().await.len() as u64)
    }

    #[inline]
    async fn count_matching(&self, filter: &RecordFilter) -> crate::Result<u64> {
        let stored = self.records.read().await;
        Ok(stored
            .values()
            .filter(|record| filter.matches(&record.metadata))
            .count() as u64)
    }
}
