use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use hybrid_rag::embedding::HashingTextEmbedder;
use hybrid_rag::error::Result;
use hybrid_rag::rerank::{CrossEncoder, Reranker};
use hybrid_rag::retrieval::{
    Candidate, DenseRetriever, FusionCombiner, RankedList, ScoreChannel, SparseRetriever,
};
use hybrid_rag::sparse::{CorpusEntry, SparseIndexConfig};
use hybrid_rag::vector::InMemoryVectorIndex;

/// Scores each passage from a fixed table.
struct TableEncoder {
    scores: HashMap<String, f32>,
}

#[async_trait]
impl CrossEncoder for TableEncoder {
    async fn score(&self, _query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        Ok(passages
            .iter()
            .map(|p| self.scores.get(*p).copied().unwrap_or(0.0))
            .collect())
    }

    fn name(&self) -> &str {
        "table"
    }
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

fn dense_list() -> Vec<Candidate> {
    vec![
        Candidate::document("Vacation policy allows 15 days").with_dense_score(0.9),
        Candidate::document("Sick leave requires a doctor's note").with_dense_score(0.6),
        Candidate::document("Remote work is allowed two days a week").with_dense_score(0.3),
    ]
}

#[test]
fn test_dense_only_fusion_when_sparse_index_unfit() {
    let sparse = SparseRetriever::new(SparseIndexConfig::default()).unwrap();
    let sparse_hits = sparse.retrieve("vacation", 10);
    assert!(sparse_hits.is_empty());

    let dense = vec![Candidate::document("Vacation policy allows 15 days").with_dense_score(0.9)];
    let fused = FusionCombiner::default().combine(dense, sparse_hits, 0.7, 0.3);

    assert_eq!(fused.len(), 1);
    assert!(approx(fused[0].combined_score, 0.63));
}

#[test]
fn test_shared_prefix_merges_across_lists() {
    let dense = vec![Candidate::document("Vacation policy allows 15 days").with_dense_score(0.8)];
    let sparse = vec![Candidate::document("Vacation policy allows 15 days").with_sparse_score(0.6)];

    let fused = FusionCombiner::default().combine(dense, sparse, 0.7, 0.3);

    assert_eq!(fused.len(), 1);
    assert!(approx(fused[0].combined_score, 0.74));
    assert!(approx(fused[0].dense_score, 0.8));
    assert!(approx(fused[0].sparse_score, 0.6));
}

#[test]
fn test_fusing_a_list_with_itself_scales_scores() {
    let original = dense_list();
    let combiner = FusionCombiner::default();

    for (wa, wb) in [(0.7, 0.3), (0.5, 0.5), (0.0, 1.0), (0.2, 0.1)] {
        let fused = combiner.fuse(vec![
            RankedList::new(original.clone(), ScoreChannel::Dense, wa),
            RankedList::new(original.clone(), ScoreChannel::Dense, wb),
        ]);

        let keys: HashSet<String> = fused.iter().map(|c| c.identity_key.clone()).collect();
        let expected: HashSet<String> = original
            .iter()
            .map(|c| combiner.identity().key(&c.content))
            .collect();
        assert_eq!(keys, expected);

        for candidate in &fused {
            let source = original
                .iter()
                .find(|o| o.content == candidate.content)
                .unwrap();
            assert!(approx(candidate.combined_score, source.dense_score * (wa + wb)));
        }
    }
}

#[test]
fn test_fusion_scores_are_non_negative() {
    let sparse = vec![
        Candidate::document("Vacation policy allows 15 days").with_sparse_score(0.4),
        Candidate::document("Parental leave lasts twelve weeks").with_sparse_score(-3.0),
    ];
    let fused = FusionCombiner::default().combine(dense_list(), sparse, 0.7, 0.3);
    assert!(fused.iter().all(|c| c.combined_score >= 0.0));

    // a negative weight is treated as zero
    let fused = FusionCombiner::default().combine(dense_list(), Vec::new(), -1.0, 0.3);
    assert!(fused.iter().all(|c| c.combined_score == 0.0));
}

#[test]
fn test_fusion_order_independence() {
    let dense = dense_list();
    let sparse = vec![
        Candidate::document("Remote work is allowed two days a week").with_sparse_score(0.9),
        Candidate::document("Vacation policy allows 15 days").with_sparse_score(0.2),
        Candidate::document("Expense reports are due monthly").with_sparse_score(0.5),
    ];
    let combiner = FusionCombiner::default();

    let forward = combiner.fuse(vec![
        RankedList::dense(dense.clone(), 0.7),
        RankedList::sparse(sparse.clone(), 0.3),
    ]);
    let backward = combiner.fuse(vec![
        RankedList::sparse(sparse, 0.3),
        RankedList::dense(dense, 0.7),
    ]);

    let scores = |list: &[Candidate]| -> HashMap<String, f32> {
        list.iter()
            .map(|c| (c.identity_key.clone(), c.combined_score))
            .collect()
    };
    let forward_scores = scores(&forward);
    let backward_scores = scores(&backward);
    assert_eq!(forward_scores.len(), 4);
    assert_eq!(forward_scores.len(), backward_scores.len());
    for (key, score) in forward_scores {
        assert!(approx(score, backward_scores[&key]));
    }
}

#[tokio::test]
async fn test_rerank_blends_and_truncates() {
    let combined = [0.9, 0.7, 0.5, 0.3, 0.1];
    let rerank = [0.1, 0.9, 0.5, 0.5, 0.9];
    let candidates: Vec<Candidate> = combined
        .iter()
        .enumerate()
        .map(|(i, score)| Candidate::document(format!("candidate{}", i + 1)).with_combined_score(*score))
        .collect();
    let scores = (1..=5)
        .map(|i| format!("candidate{i}"))
        .zip(rerank)
        .collect();

    let reranker = Reranker::new(Arc::new(TableEncoder { scores }));
    let results = reranker.rerank("query", candidates, 3).await;

    let order: Vec<&str> = results.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(order, vec!["candidate2", "candidate1", "candidate3"]);
    assert!(approx(results[0].final_score.unwrap(), 0.76));
    assert!(approx(results[1].final_score.unwrap(), 0.66));
    assert!(approx(results[2].final_score.unwrap(), 0.5));
}

#[tokio::test]
async fn test_rerank_length_and_bounds() {
    let scores: HashMap<String, f32> = (0..8).map(|i| (format!("passage {i}"), (i as f32) / 8.0)).collect();
    let reranker = Reranker::new(Arc::new(TableEncoder { scores }));

    for top_k in [1, 3, 8, 20] {
        let candidates: Vec<Candidate> = (0..8)
            .map(|i| {
                Candidate::document(format!("passage {i}")).with_combined_score(1.0 - (i as f32) / 10.0)
            })
            .collect();
        let results = reranker.rerank("query", candidates, top_k).await;

        assert_eq!(results.len(), top_k.min(8));
        for pair in results.windows(2) {
            assert!(pair[0].final_score.unwrap() >= pair[1].final_score.unwrap());
        }
        for candidate in &results {
            let low = candidate.combined_score.min(candidate.rerank_score.unwrap());
            let high = candidate.combined_score.max(candidate.rerank_score.unwrap());
            let final_score = candidate.final_score.unwrap();
            assert!(final_score >= low - 1e-6 && final_score <= high + 1e-6);
        }
    }
}

#[tokio::test]
async fn test_empty_inputs_return_empty_lists() {
    let sparse = SparseRetriever::new(SparseIndexConfig::default()).unwrap();
    assert!(sparse.retrieve("anything", 5).is_empty());

    let dense = DenseRetriever::new(
        Arc::new(HashingTextEmbedder::new().unwrap()),
        Arc::new(InMemoryVectorIndex::new()),
    );
    assert!(dense.try_retrieve("anything", 5).await.unwrap().is_empty());

    let reranker = Reranker::new(Arc::new(TableEncoder {
        scores: HashMap::new(),
    }));
    assert!(reranker.rerank("anything", Vec::new(), 5).await.is_empty());
}

#[test]
fn test_sparse_returns_only_nonzero_matches() {
    let sparse = SparseRetriever::new(SparseIndexConfig::default()).unwrap();
    sparse
        .fit(vec![
            CorpusEntry::new("a", "The vacation policy grants fifteen days."),
            CorpusEntry::new("b", "Expense reports are due at month end."),
            CorpusEntry::new("c", "Our sick leave policy needs a note."),
            CorpusEntry::new("d", "Laptops are refreshed every three years."),
            CorpusEntry::new("e", "Parking passes are issued at reception."),
        ])
        .unwrap();

    let hits = sparse.retrieve("policy", 10);
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|c| c.dense_score == 0.0 && c.sparse_score > 0.0));
    // equal similarity keeps corpus order
    let ids: Vec<&str> = hits.iter().filter_map(|c| c.metadata_str("chunk_id")).collect();
    assert_eq!(ids, vec!["a", "c"]);
}
