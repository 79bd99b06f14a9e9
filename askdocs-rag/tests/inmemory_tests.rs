//! Tests for the in-memory vector index.

mod common;

use std::collections::HashMap;

use askdocs_rag::{InMemoryVectorIndex, IndexRecord, RagError, Similarity, VectorIndex};
use common::record;
use proptest::prelude::*;

#[tokio::test]
async fn empty_index_returns_no_results() {
    let index = InMemoryVectorIndex::new(3);
    let results = index.query(&[1.0, 0.0, 0.0], 3).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn zero_k_is_invalid_argument() {
    let index = InMemoryVectorIndex::new(3);
    index.upsert(&[record("a", vec![1.0, 0.0, 0.0])]).await.unwrap();
    let err = index.query(&[1.0, 0.0, 0.0], 0).await.unwrap_err();
    assert!(matches!(err, RagError::InvalidArgument(_)));
}

#[tokio::test]
async fn upsert_same_id_keeps_one_record_with_latest_vector() {
    let index = InMemoryVectorIndex::new(2);
    let mut first = record("original", vec![1.0, 0.0]);
    index.upsert(std::slice::from_ref(&first)).await.unwrap();

    first.vector = vec![0.0, 1.0];
    first.fragment_text = "replacement".to_string();
    index.upsert(std::slice::from_ref(&first)).await.unwrap();

    assert_eq!(index.len().await, 1);
    let stored = index.get(&first.id).await.unwrap();
    assert_eq!(stored.vector, vec![0.0, 1.0]);
    assert_eq!(stored.fragment_text, "replacement");

    let hits = index.query(&[0.0, 1.0], 5).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!((hits[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn results_are_ranked_by_cosine_similarity() {
    let index = InMemoryVectorIndex::new(2);
    index
        .upsert(&[
            record("orthogonal", vec![0.0, 1.0]),
            record("exact", vec![2.0, 0.0]),
            record("close", vec![1.0, 0.2]),
        ])
        .await
        .unwrap();

    let hits = index.query(&[1.0, 0.0], 2).await.unwrap();
    let texts: Vec<&str> = hits.iter().map(|h| h.record.fragment_text.as_str()).collect();
    assert_eq!(texts, ["exact", "close"]);
    assert!((hits[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn ties_keep_insertion_order_even_after_overwrite() {
    let index = InMemoryVectorIndex::new(2);
    let first = record("first", vec![1.0, 0.0]);
    let second = record("second", vec![1.0, 0.0]);
    let third = record("third", vec![1.0, 0.0]);
    index.upsert(&[first.clone(), second.clone(), third.clone()]).await.unwrap();

    // Re-upserting an id must not move it to the back.
    index.upsert(std::slice::from_ref(&first)).await.unwrap();

    let hits = index.query(&[1.0, 0.0], 3).await.unwrap();
    let ids: Vec<_> = hits.iter().map(|h| h.record.id).collect();
    assert_eq!(ids, [first.id, second.id, third.id]);
}

#[tokio::test]
async fn repeated_queries_are_deterministic() {
    let index = InMemoryVectorIndex::new(4);
    let records: Vec<IndexRecord> = (0..20)
        .map(|i| {
            let x = i as f32;
            record(&format!("r{i}"), vec![x.sin(), x.cos(), (x * 0.5).sin(), 1.0])
        })
        .collect();
    index.upsert(&records).await.unwrap();

    let query = [0.3, -0.2, 0.9, 0.1];
    let first = index.query(&query, 7).await.unwrap();
    for _ in 0..5 {
        assert_eq!(index.query(&query, 7).await.unwrap(), first);
    }
}

#[tokio::test]
async fn wrong_dimension_is_rejected_without_writing() {
    let index = InMemoryVectorIndex::new(3);
    let batch = [record("ok", vec![1.0, 0.0, 0.0]), record("bad", vec![1.0, 0.0])];

    let err = index.upsert(&batch).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 2 }));
    assert!(index.is_empty().await);

    let err = index.query(&[1.0], 1).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 1 }));
}

#[tokio::test]
async fn dot_product_metric_ranks_by_magnitude() {
    let index = InMemoryVectorIndex::new(2).with_metric(Similarity::DotProduct);
    assert_eq!(index.metric(), Similarity::DotProduct);
    index
        .upsert(&[record("small", vec![1.0, 0.0]), record("large", vec![3.0, 0.0])])
        .await
        .unwrap();

    let hits = index.query(&[1.0, 0.0], 2).await.unwrap();
    assert_eq!(hits[0].record.fragment_text, "large");
    assert!((hits[0].score - 3.0).abs() < 1e-6);
}

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_k(
            vectors in proptest::collection::vec(arb_normalized_embedding(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, stored) = rt.block_on(async {
                let index = InMemoryVectorIndex::new(DIM);
                let records: Vec<IndexRecord> = vectors
                    .into_iter()
                    .enumerate()
                    .map(|(i, vector)| IndexRecord {
                        id: uuid::Uuid::new_v4(),
                        fragment_text: format!("fragment {i}"),
                        vector,
                        metadata: HashMap::new(),
                    })
                    .collect();
                let stored = records.len();
                index.upsert(&records).await.unwrap();
                (index.query(&query, k).await.unwrap(), stored)
            });

            prop_assert!(results.len() <= k);
            prop_assert_eq!(results.len(), k.min(stored));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }
    }
}
