use super::*;
use crate::database::memory::MemoryVectorIndex;
use crate::database::sqlite::models::NewDocument;
use crate::database::{RecordMetadata, VectorRecord};
use crate::embeddings::{EmbeddingProvider, RawEmbedding};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const VOCABULARY: &[&str] = &["bolts", "payment", "projects", "clients", "profile", "hiring"];
const DIMENSION: usize = 8;

/// Bag-of-words embedding over a tiny vocabulary
struct VocabularyProvider;

#[async_trait]
impl EmbeddingProvider for VocabularyProvider {
    async fn embed_raw(&self, text: &str) -> anyhow::Result<RawEmbedding> {
        let lowered = text.to_lowercase();
        let mut values: Vec<f32> = VOCABULARY
            .iter()
            .map(|word| if lowered.contains(word) { 1.0 } else { 0.0 })
            .collect();
        values.push(0.01);
        Ok(RawEmbedding::Flat(values))
    }
}

/// Wraps an index and fails every query with the given top_k
struct FailingTopK {
    inner: MemoryVectorIndex,
    failing_top_k: usize,
    queries: AtomicUsize,
}

#[async_trait]
impl VectorIndex for FailingTopK {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn upsert_all(&self, records: &[VectorRecord]) -> crate::Result<()> {
        self.inner.upsert_all(records).await
    }

    async fn delete_all(&self) -> crate::Result<()> {
        self.inner.delete_all().await
    }

    async fn query(
        &self,
        vector: &[f32],
        filter: Option<&RecordFilter>,
        top_k: usize,
    ) -> crate::Result<Vec<Match>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if top_k == self.failing_top_k {
            return Err(crate::DocQaError::Database("index unavailable".to_string()));
        }
        self.inner.query(vector, filter, top_k).await
    }

    async fn fetch_by_ids(&self, ids: &[String]) -> crate::Result<Vec<VectorRecord>> {
        self.inner.fetch_by_ids(ids).await
    }

    async fn count(&self) -> crate::Result<u64> {
        self.inner.count().await
    }

    async fn count_matching(&self, filter: &RecordFilter) -> crate::Result<u64> {
        self.inner.count_matching(filter).await
    }
}

fn embedder() -> Embedder {
    Embedder::new(Arc::new(VocabularyProvider), DIMENSION)
}

async fn record(id: &str, document_id: &str, text: &str) -> VectorRecord {
    VectorRecord {
        id: id.to_string(),
        values: embedder().embed(text).await.values,
        metadata: RecordMetadata {
            text: text.to_string(),
            document_id: document_id.to_string(),
            filename: "guide.pdf".to_string(),
            timestamp: Utc::now(),
        },
    }
}

async fn seeded_index() -> Arc<MemoryVectorIndex> {
    let index = Arc::new(MemoryVectorIndex::new(DIMENSION));
    let records = vec![
        record("a-0", "doc-a", "Bolts are spent to apply to projects").await,
        record("a-1", "doc-a", "Payment happens off platform").await,
        record("a-2", "doc-a", "Clients post projects for hiring").await,
        record("b-0", "doc-b", "Bolts in another document").await,
    ];
    index.upsert_all(&records).await.expect("seed index");
    index
}

fn match_with(id: &str, score: f32) -> Match {
    Match {
        id: id.to_string(),
        score,
        metadata: RecordMetadata {
            text: id.to_string(),
            document_id: "doc".to_string(),
            filename: "doc.pdf".to_string(),
            timestamp: Utc::now(),
        },
    }
}

fn found(retrieval: Retrieval) -> RetrievedContext {
    match retrieval {
        Retrieval::Found(context) => context,
        Retrieval::NoMatches => panic!("expected matches"),
    }
}

#[test]
fn keywords_are_cleaned_and_limited() {
    assert_eq!(
        extract_keywords("What are the BOLTS, used for?", 3, 3),
        vec!["what", "bolts", "used"]
    );
    assert_eq!(
        extract_keywords("How do payment and payment terms work", 3, 3),
        vec!["payment", "terms", "work"]
    );
    assert!(extract_keywords("is it ok?", 3, 3).is_empty());
    assert!(extract_keywords("lengthy question words", 3, 0).is_empty());
}

#[test]
fn keywords_drop_non_ascii_word_characters() {
    assert_eq!(extract_keywords("café résumé", 3, 3), vec!["rsum"]);
    assert_eq!(extract_keywords("snake_case_name!", 3, 3), vec!["snake_case_name"]);
}

#[test]
fn merge_keeps_first_occurrence_and_sorts() {
    let merged = merge_matches(vec![
        vec![match_with("a", 0.5), match_with("c", 0.2)],
        vec![match_with("a", 0.9), match_with("b", 0.7)],
    ]);

    let ids: Vec<&str> = merged.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a", "c"]);
    assert!((merged[1].score - 0.5).abs() < f32::EPSILON);
}

#[test]
fn default_config_is_valid() {
    let config = RetrievalConfig::default();
    assert_eq!(config.primary_top_k, 50);
    assert_eq!(config.keyword_top_k, 20);
    assert_eq!(config.context_limit, 30);
    assert_eq!(config.high_relevance_count, 15);
    assert!(config.validate().is_ok());

    let invalid = RetrievalConfig {
        primary_top_k: 0,
        ..RetrievalConfig::default()
    };
    assert!(matches!(invalid.validate(), Err(ConfigError::InvalidTopK(0))));
}

#[tokio::test]
async fn empty_index_has_no_matches() {
    let retriever = Retriever::new(
        embedder(),
        Arc::new(MemoryVectorIndex::new(DIMENSION)),
        None,
        RetrievalConfig::default(),
    );

    let retrieval = retriever
        .retrieve("what are bolts", None)
        .await
        .expect("retrieval should succeed");
    assert_eq!(retrieval, Retrieval::NoMatches);
}

#[tokio::test]
async fn requested_document_filters_matches() {
    let retriever = Retriever::new(
        embedder(),
        seeded_index().await,
        None,
        RetrievalConfig::default(),
    );

    let context = found(
        retriever
            .retrieve("what are bolts", Some("doc-a"))
            .await
            .expect("retrieval should succeed"),
    );

    assert_eq!(context.len(), 3);
    assert!(
        context
            .high_relevance
            .iter()
            .all(|m| m.metadata.document_id == "doc-a")
    );
    assert_eq!(context.high_relevance[0].id, "a-0");
}

#[tokio::test]
async fn without_document_or_registry_searches_everything() {
    let retriever = Retriever::new(
        embedder(),
        seeded_index().await,
        None,
        RetrievalConfig::default(),
    );

    let context = found(
        retriever
            .retrieve("bolts", None)
            .await
            .expect("retrieval should succeed"),
    );
    assert_eq!(context.len(), 4);
}

#[tokio::test]
async fn active_document_is_used_when_none_requested() {
    let temp_dir = TempDir::new().expect("temp dir");
    let registry = Database::initialize_from_config_dir(temp_dir.path())
        .await
        .expect("registry");
    registry
        .record_ingestion(NewDocument {
            document_id: "doc-b".to_string(),
            filename: "other.pdf".to_string(),
            uploaded_at: Utc::now(),
            chunk_count: 1,
        })
        .await
        .expect("record ingestion");

    let retriever = Retriever::new(
        embedder(),
        seeded_index().await,
        Some(registry),
        RetrievalConfig::default(),
    );

    assert_eq!(
        retriever.resolve_document(None).await.as_deref(),
        Some("doc-b")
    );
    assert_eq!(
        retriever.resolve_document(Some("doc-a")).await.as_deref(),
        Some("doc-a")
    );

    let context = found(
        retriever
            .retrieve("bolts", None)
            .await
            .expect("retrieval should succeed"),
    );
    assert_eq!(context.len(), 1);
    assert_eq!(context.high_relevance[0].id, "b-0");
}

#[tokio::test]
async fn stale_active_document_falls_back_to_whole_index() {
    let temp_dir = TempDir::new().expect("temp dir");
    let registry = Database::initialize_from_config_dir(temp_dir.path())
        .await
        .expect("registry");
    registry
        .record_ingestion(NewDocument {
            document_id: "doc-gone".to_string(),
            filename: "old.pdf".to_string(),
            uploaded_at: Utc::now(),
            chunk_count: 5,
        })
        .await
        .expect("record ingestion");

    let retriever = Retriever::new(
        embedder(),
        seeded_index().await,
        Some(registry),
        RetrievalConfig::default(),
    );

    assert_eq!(retriever.resolve_document(None).await, None);

    let context = found(
        retriever
            .retrieve("bolts", None)
            .await
            .expect("retrieval should succeed"),
    );
    assert_eq!(context.len(), 4);
}

#[tokio::test]
async fn failing_keyword_queries_are_ignored() {
    let inner = MemoryVectorIndex::new(DIMENSION);
    inner
        .upsert_all(&[record("a-0", "doc-a", "Bolts are spent on projects").await])
        .await
        .expect("seed");
    let index = Arc::new(FailingTopK {
        inner,
        failing_top_k: 20,
        queries: AtomicUsize::new(0),
    });

    let retriever = Retriever::new(
        embedder(),
        Arc::clone(&index) as Arc<dyn VectorIndex>,
        None,
        RetrievalConfig::default(),
    );

    let context = found(
        retriever
            .retrieve("explain bolts pricing", None)
            .await
            .expect("keyword failures are not fatal"),
    );

    assert_eq!(context.len(), 1);
    assert_eq!(index.queries.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn failing_primary_query_is_an_error() {
    let index = Arc::new(FailingTopK {
        inner: MemoryVectorIndex::new(DIMENSION),
        failing_top_k: 50,
        queries: AtomicUsize::new(0),
    });
    let retriever = Retriever::new(embedder(), index, None, RetrievalConfig::default());

    assert!(retriever.retrieve("what are bolts", None).await.is_err());
}

#[tokio::test]
async fn context_limit_and_bands_apply() {
    let index = Arc::new(MemoryVectorIndex::new(DIMENSION));
    let mut records = Vec::new();
    for i in 0..10 {
        records.push(record(&format!("c-{}", i), "doc", &format!("bolts chunk {}", i)).await);
    }
    index.upsert_all(&records).await.expect("seed");

    let config = RetrievalConfig {
        context_limit: 6,
        high_relevance_count: 4,
        ..RetrievalConfig::default()
    };
    let retriever = Retriever::new(embedder(), index, None, config);

    let context = found(
        retriever
            .retrieve("bolts", None)
            .await
            .expect("retrieval should succeed"),
    );
    assert_eq!(context.high_relevance.len(), 4);
    assert_eq!(context.additional.len(), 2);

    let ids: Vec<&str> = context
        .high_relevance
        .iter()
        .chain(&context.additional)
        .map(|m| m.id.as_str())
        .collect();
    let unique: std::collections::HashSet<&&str> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
}
