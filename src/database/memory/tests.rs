use super::*;
use crate::database::RecordMetadata;
use chrono::Utc;

fn record(id: &str, document_id: &str, values: Vec<f32>) -> VectorRecord {
    VectorRecord {
        id: id.to_string(),
        values,
        metadata: RecordMetadata {
            text: format!("text of {}", id),
            document_id: document_id.to_string(),
            filename: "notes.pdf".to_string(),
            timestamp: Utc::now(),
        },
    }
}

#[test]
fn cosine_similarity_basics() {
    assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
}

#[tokio::test]
async fn query_orders_by_score_and_truncates() {
    let index = MemoryVectorIndex::new(2);
    index
        .upsert_all(&[
            record("far", "doc", vec![0.0, 1.0]),
            record("near", "doc", vec![1.0, 0.1]),
            record("exact", "doc", vec![1.0, 0.0]),
        ])
        .await
        .expect("upsert");

    let matches = index.query(&[1.0, 0.0], None, 2).await.expect("query");
    let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["exact", "near"]);
}

#[tokio::test]
async fn filter_limits_to_document() {
    let index = MemoryVectorIndex::new(2);
    index
        .upsert_all(&[
            record("a", "doc-a", vec![1.0, 0.0]),
            record("b", "doc-b", vec![1.0, 0.0]),
        ])
        .await
        .expect("upsert");

    let filter = RecordFilter::document("doc-b");
    let matches = index
        .query(&[1.0, 0.0], Some(&filter), 10)
        .await
        .expect("query");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, "b");

    assert_eq!(index.count_matching(&filter).await.expect("count"), 1);
    assert_eq!(
        index
            .count_matching(&RecordFilter::document("doc-c"))
            .await
            .expect("count"),
        0
    );
}

#[tokio::test]
async fn upsert_replaces_and_delete_clears() {
    let index = MemoryVectorIndex::new(2);
    index
        .upsert_all(&[record("a", "doc", vec![1.0, 0.0])])
        .await
        .expect("upsert");
    index
        .upsert_all(&[record("a", "doc", vec![0.0, 1.0])])
        .await
        .expect("upsert");
    assert_eq!(index.count().await.expect("count"), 1);

    let fetched = index
        .fetch_by_ids(&["a".to_string(), "missing".to_string()])
        .await
        .expect("fetch");
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].values, vec![0.0, 1.0]);

    index.delete_all().await.expect("delete");
    assert_eq!(index.count().await.expect("count"), 0);
}

#[tokio::test]
async fn dimension_mismatch_is_rejected() {
    let index = MemoryVectorIndex::new(3);

    assert!(
        index
            .upsert_all(&[record("a", "doc", vec![1.0, 0.0])])
            .await
            .is_err()
    );
    assert!(index.query(&[1.0], None, 5).await.is_err());
    assert_eq!(index.count().await.expect("count"), 0);
}
