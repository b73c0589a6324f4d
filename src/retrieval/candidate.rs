//! The unit of retrieved text that flows through every pipeline stage.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Provenance details attached to a candidate (document id, chunk index, URL...).
pub type Metadata = HashMap<String, Value>;

/// Number of leading characters used as the default deduplication key.
pub const DEFAULT_IDENTITY_PREFIX_CHARS: usize = 100;

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// A chunk of an ingested document.
    Document,
    /// A live web search result.
    Web,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Document => write!(f, "document"),
            SourceType::Web => write!(f, "web"),
        }
    }
}

/// The retrieval paths a query can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalPath {
    /// Embedding similarity against the vector index.
    Dense,
    /// TF-IDF cosine similarity against the fitted sparse index.
    Sparse,
    /// Live web search.
    Web,
}

impl fmt::Display for RetrievalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalPath::Dense => write!(f, "dense"),
            RetrievalPath::Sparse => write!(f, "sparse"),
            RetrievalPath::Web => write!(f, "web"),
        }
    }
}

/// One retrieved unit of text considered for answering a query.
///
/// A candidate is created per query by a retriever, mutated by the fusion
/// combiner (score merge) and by the re-ranker (`rerank_score` and
/// `final_score` attached), and discarded once the caller consumes the list.
/// `rerank_score` and `final_score` stay `None` until re-ranking succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// The text passed to downstream scoring and generation.
    pub content: String,
    /// Provenance tag.
    pub source_type: SourceType,
    /// Similarity from the dense retriever, in [0, 1]; 0 if not retrieved by it.
    pub dense_score: f32,
    /// Lexical similarity, in [0, 1]; 0 if not retrieved lexically.
    ///
    /// Web results carry their query-overlap relevance here.
    pub sparse_score: f32,
    /// Weighted sum of the scores merged by fusion.
    pub combined_score: f32,
    /// Pairwise relevance from the cross-encoder.
    pub rerank_score: Option<f32>,
    /// Blend of `combined_score` and `rerank_score`.
    pub final_score: Option<f32>,
    /// Approximate deduplication key derived from `content`.
    pub identity_key: String,
    /// Provenance details.
    pub metadata: Metadata,
}

impl Candidate {
    /// Create a candidate with all scores at zero.
    ///
    /// The identity key defaults to the first
    /// [`DEFAULT_IDENTITY_PREFIX_CHARS`] characters of `content`; the fusion
    /// combiner re-derives it with its own key strategy.
    pub fn new<S: Into<String>>(content: S, source_type: SourceType) -> Self {
        let content = content.into();
        let identity_key = content
            .chars()
            .take(DEFAULT_IDENTITY_PREFIX_CHARS)
            .collect();
        Self {
            content,
            source_type,
            dense_score: 0.0,
            sparse_score: 0.0,
            combined_score: 0.0,
            rerank_score: None,
            final_score: None,
            identity_key,
            metadata: Metadata::new(),
        }
    }

    /// Create a document candidate.
    pub fn document<S: Into<String>>(content: S) -> Self {
        Self::new(content, SourceType::Document)
    }

    /// Create a web candidate.
    pub fn web<S: Into<String>>(content: S) -> Self {
        Self::new(content, SourceType::Web)
    }

    /// Set the dense score, clamped to [0, 1].
    pub fn with_dense_score(mut self, score: f32) -> Self {
        self.dense_score = clamp_unit(score);
        self
    }

    /// Set the sparse score, clamped to [0, 1].
    pub fn with_sparse_score(mut self, score: f32) -> Self {
        self.sparse_score = clamp_unit(score);
        self
    }

    /// Set the combined score.
    pub fn with_combined_score(mut self, score: f32) -> Self {
        self.combined_score = score;
        self
    }

    /// Replace the metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Add a single metadata entry.
    pub fn with_metadata_entry<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The score that orders this candidate at its current stage:
    /// `final_score` once re-ranked, `combined_score` before.
    pub fn ranking_score(&self) -> f32 {
        self.final_score.unwrap_or(self.combined_score)
    }

    /// Whether the re-ranker has scored this candidate.
    pub fn is_reranked(&self) -> bool {
        self.rerank_score.is_some()
    }

    /// Drop any re-ranking output, returning the candidate to its pre-rerank state.
    pub fn clear_rerank(&mut self) {
        self.rerank_score = None;
        self.final_score = None;
    }

    /// Look up a string metadata value.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

fn clamp_unit(score: f32) -> f32 {
    if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_candidate_defaults() {
        let candidate = Candidate::document("Vacation policy allows 15 days");
        assert_eq!(candidate.source_type, SourceType::Document);
        assert_eq!(candidate.dense_score, 0.0);
        assert_eq!(candidate.sparse_score, 0.0);
        assert_eq!(candidate.combined_score, 0.0);
        assert!(candidate.rerank_score.is_none());
        assert!(candidate.final_score.is_none());
        assert_eq!(candidate.identity_key, "Vacation policy allows 15 days");
        assert!(!candidate.is_reranked());
    }

    #[test]
    fn test_identity_key_is_prefix() {
        let long = "x".repeat(150);
        let candidate = Candidate::web(long.clone());
        assert_eq!(candidate.identity_key.chars().count(), 100);
        assert!(long.starts_with(&candidate.identity_key));
    }

    #[test]
    fn test_scores_are_clamped() {
        let candidate = Candidate::document("a")
            .with_dense_score(1.3)
            .with_sparse_score(-0.2);
        assert_eq!(candidate.dense_score, 1.0);
        assert_eq!(candidate.sparse_score, 0.0);
        assert_eq!(Candidate::document("b").with_dense_score(f32::NAN).dense_score, 0.0);
    }

    #[test]
    fn test_ranking_score_prefers_final() {
        let mut candidate = Candidate::document("a").with_combined_score(0.4);
        assert_eq!(candidate.ranking_score(), 0.4);
        candidate.rerank_score = Some(0.9);
        candidate.final_score = Some(0.55);
        assert_eq!(candidate.ranking_score(), 0.55);
        candidate.clear_rerank();
        assert_eq!(candidate.ranking_score(), 0.4);
    }

    #[test]
    fn test_serializes_source_type_lowercase() {
        let candidate = Candidate::web("page").with_metadata_entry("url", "https://example.org");
        let value = serde_json::to_value(&candidate).unwrap();
        assert_eq!(value["source_type"], json!("web"));
        assert_eq!(value["rerank_score"], json!(null));
        assert_eq!(candidate.metadata_str("url"), Some("https://example.org"));
    }
}
