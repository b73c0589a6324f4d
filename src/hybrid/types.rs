//! Request and result types for hybrid search.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RagError;
use crate::retrieval::candidate::{Candidate, SourceType};

/// Which retrieval sources a query uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Documents, plus the web when requested and configured.
    #[default]
    Hybrid,
    /// Dense and sparse document retrieval only; the web is never called.
    DocumentsOnly,
    /// Web search only; document indexes are never queried.
    WebOnly,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchMode::Hybrid => "hybrid",
            SearchMode::DocumentsOnly => "documents_only",
            SearchMode::WebOnly => "web_only",
        };
        f.write_str(name)
    }
}

impl FromStr for SearchMode {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hybrid" => Ok(SearchMode::Hybrid),
            "documents_only" | "documents" | "document" => Ok(SearchMode::DocumentsOnly),
            "web_only" | "web" => Ok(SearchMode::WebOnly),
            other => Err(RagError::invalid_argument(format!("unknown search mode: {other}"))),
        }
    }
}

/// Pipeline checkpoints, recorded in order for each query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStage {
    Init,
    DenseDone,
    SparseDone,
    Fused,
    WebFused,
    Reranked,
    Done,
}

/// A hybrid search request. Unset options fall back to the engine config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridSearchRequest {
    pub query: String,
    pub mode: SearchMode,
    pub max_results: Option<usize>,
    pub dense_weight: Option<f32>,
    pub sparse_weight: Option<f32>,
    pub include_web: Option<bool>,
}

impl HybridSearchRequest {
    pub fn new<S: Into<String>>(query: S) -> Self {
        HybridSearchRequest {
            query: query.into(),
            mode: SearchMode::default(),
            max_results: None,
            dense_weight: None,
            sparse_weight: None,
            include_web: None,
        }
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Override the dense/sparse fusion weights.
    pub fn with_weights(mut self, dense_weight: f32, sparse_weight: f32) -> Self {
        self.dense_weight = Some(dense_weight);
        self.sparse_weight = Some(sparse_weight);
        self
    }

    pub fn with_include_web(mut self, include_web: bool) -> Self {
        self.include_web = Some(include_web);
        self
    }
}

/// The outcome of one hybrid search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridSearchResults {
    pub query: String,
    pub mode: SearchMode,
    /// Final ranking, at most `max_results` long.
    pub results: Vec<Candidate>,
    /// `results.len()`.
    pub total_results: usize,
    /// Size of the fused document list before the final re-rank.
    pub document_results: usize,
    /// Number of web candidates retrieved.
    pub web_results: usize,
    /// Wall-clock seconds spent on the query.
    pub response_time: f64,
    /// Stages the query went through.
    pub stages: Vec<SearchStage>,
}

impl HybridSearchResults {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// The top-ranked candidate.
    pub fn best(&self) -> Option<&Candidate> {
        self.results.first()
    }

    /// Final results of one source type, in rank order.
    pub fn of_type(&self, source_type: SourceType) -> impl Iterator<Item = &Candidate> {
        self.results
            .iter()
            .filter(move |c| c.source_type == source_type)
    }
}
