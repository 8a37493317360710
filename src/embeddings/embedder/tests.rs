use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

struct FixedProvider(RawEmbedding);

#[async_trait]
impl EmbeddingProvider for FixedProvider {
    async fn embed_raw(&self, _text: &str) -> Result<RawEmbedding> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
struct FailingProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for FailingProvider {
    async fn embed_raw(&self, _text: &str) -> Result<RawEmbedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("provider unavailable"))
    }
}

fn embedder_with(raw: RawEmbedding, dimension: usize) -> Embedder {
    Embedder::new(Arc::new(FixedProvider(raw)), dimension)
}

#[test]
fn raw_embedding_shapes_deserialize() {
    let flat: RawEmbedding = serde_json::from_str("[0.1, 0.2]").expect("flat parses");
    assert_eq!(flat.into_values(), vec![0.1, 0.2]);

    let nested: RawEmbedding =
        serde_json::from_str("[[0.3, 0.4], [0.9, 0.9]]").expect("nested parses");
    assert_eq!(nested.into_values(), vec![0.3, 0.4]);

    let batch: RawEmbedding =
        serde_json::from_str(r#"{"embeddings": [[0.5]]}"#).expect("batch parses");
    assert_eq!(batch.into_values(), vec![0.5]);

    let single: RawEmbedding =
        serde_json::from_str(r#"{"embedding": [0.6, 0.7]}"#).expect("single parses");
    assert_eq!(single.into_values(), vec![0.6, 0.7]);
}

#[test]
fn empty_nested_output_has_no_values() {
    assert!(RawEmbedding::Nested(vec![]).into_values().is_empty());
}

#[test]
fn normalize_pads_and_truncates() {
    assert_eq!(normalize_dimension(vec![1.0, 2.0], 4), vec![1.0, 2.0, 0.0, 0.0]);
    assert_eq!(normalize_dimension(vec![1.0, 2.0, 3.0], 2), vec![1.0, 2.0]);
    assert_eq!(normalize_dimension(vec![1.0], 1), vec![1.0]);
}

#[tokio::test]
async fn short_embedding_is_zero_padded() {
    let embedder = embedder_with(RawEmbedding::Flat(vec![0.25; 768]), 1536);
    let embedding = embedder.embed("hello").await;

    assert_eq!(embedding.quality, EmbeddingQuality::Provided);
    assert_eq!(embedding.values.len(), 1536);
    assert!(embedding.values[..768].iter().all(|v| (*v - 0.25).abs() < f32::EPSILON));
    assert!(embedding.values[768..].iter().all(|v| *v == 0.0));
}

#[tokio::test]
async fn long_embedding_is_truncated() {
    let values: Vec<f32> = (0..2000).map(|i| i as f32).collect();
    let embedder = embedder_with(RawEmbedding::Flat(values), 1536);
    let embedding = embedder.embed("hello").await;

    assert_eq!(embedding.values.len(), 1536);
    assert_eq!(embedding.values[1535], 1535.0);
    assert!(!embedding.is_degraded());
}

#[tokio::test]
async fn nested_embedding_uses_first_row() {
    let embedder = embedder_with(
        RawEmbedding::Nested(vec![vec![0.1, 0.2, 0.3], vec![9.0, 9.0, 9.0]]),
        4,
    );
    let embedding = embedder.embed("hello").await;

    assert_eq!(embedding.values, vec![0.1, 0.2, 0.3, 0.0]);
}

#[tokio::test]
async fn provider_failure_degrades_to_random_values() {
    let provider = Arc::new(FailingProvider::default());
    let embedder = Embedder::new(Arc::clone(&provider) as Arc<dyn EmbeddingProvider>, 1536);

    let embedding = embedder.embed("hello").await;

    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert!(embedding.is_degraded());
    assert_eq!(embedding.values.len(), 1536);
    assert!(embedding.values.iter().all(|v| (-1.0..=1.0).contains(v)));
}

#[tokio::test]
async fn empty_provider_output_degrades() {
    let embedder = embedder_with(RawEmbedding::Flat(vec![]), 64);
    let embedding = embedder.embed("hello").await;

    assert!(embedding.is_degraded());
    assert_eq!(embedding.values.len(), 64);
}

#[tokio::test]
async fn non_finite_output_degrades() {
    let embedder = embedder_with(RawEmbedding::Flat(vec![0.1, f32::NAN]), 64);
    let embedding = embedder.embed("hello").await;

    assert!(embedding.is_degraded());
    assert!(embedding.values.iter().all(|v| v.is_finite()));
}
