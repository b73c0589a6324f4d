//! Dense retrieval over a vector index.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::embedding::TextEmbedder;
use crate::error::{RagError, Result};
use crate::retrieval::candidate::{Candidate, RetrievalPath};
use crate::util::with_timeout;
use crate::vector::{MetadataFilter, VectorHit, VectorIndex};

/// Time budgets for the dense retriever's external calls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenseRetrieverConfig {
    /// Budget for embedding the query.
    pub embed_timeout: Duration,
    /// Budget for the nearest-neighbour query.
    pub query_timeout: Duration,
}

impl Default for DenseRetrieverConfig {
    fn default() -> Self {
        DenseRetrieverConfig {
            embed_timeout: Duration::from_secs(10),
            query_timeout: Duration::from_secs(5),
        }
    }
}

/// Retrieves document chunks by embedding cosine similarity.
///
/// The embedder must be the one used to index the chunks.
#[derive(Clone)]
pub struct DenseRetriever {
    embedder: Arc<dyn TextEmbedder>,
    index: Arc<dyn VectorIndex>,
    config: DenseRetrieverConfig,
    filter: Option<MetadataFilter>,
}

impl std::fmt::Debug for DenseRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenseRetriever")
            .field("embedder", &self.embedder.name())
            .field("config", &self.config)
            .field("filter", &self.filter)
            .finish()
    }
}

impl DenseRetriever {
    pub fn new(embedder: Arc<dyn TextEmbedder>, index: Arc<dyn VectorIndex>) -> Self {
        DenseRetriever {
            embedder,
            index,
            config: DenseRetrieverConfig::default(),
            filter: None,
        }
    }

    pub fn with_config(mut self, config: DenseRetrieverConfig) -> Self {
        self.config = config;
        self
    }

    /// Restrict every query to records matching `filter`.
    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = (!filter.is_empty()).then_some(filter);
        self
    }

    pub fn embedder(&self) -> &Arc<dyn TextEmbedder> {
        &self.embedder
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Up to `k` candidates ranked by `1 - cosine distance`, or the reason
    /// the vector path could not be used.
    ///
    /// An empty index is not a failure and yields `Ok(vec![])`.
    pub async fn try_retrieve(&self, query: &str, k: usize) -> Result<Vec<Candidate>> {
        if query.trim().is_empty() {
            return Err(RagError::invalid_argument("query must not be empty"));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let embedding = with_timeout(
            "query embedding",
            self.config.embed_timeout,
            self.embedder.embed(query),
        )
        .await
        .map_err(|e| e.into_unavailable(RetrievalPath::Dense))?;

        let hits = with_timeout(
            "vector index query",
            self.config.query_timeout,
            self.index.query(&embedding, k, self.filter.as_ref()),
        )
        .await
        .map_err(|e| e.into_unavailable(RetrievalPath::Dense))?;

        Ok(hits.into_iter().take(k).map(hit_to_candidate).collect())
    }

    /// Like [`try_retrieve`](Self::try_retrieve), but a failure is logged
    /// and degrades to an empty list.
    pub async fn retrieve(&self, query: &str, k: usize) -> Vec<Candidate> {
        match self.try_retrieve(query, k).await {
            Ok(candidates) => candidates,
            Err(e) => {
                log::warn!(
                    "dense retrieval degraded to no results (embedder {}): {e}",
                    self.embedder.name()
                );
                Vec::new()
            }
        }
    }
}

fn hit_to_candidate(hit: VectorHit) -> Candidate {
    let VectorHit {
        id,
        text,
        mut metadata,
        distance,
    } = hit;
    metadata
        .entry("chunk_id".to_string())
        .or_insert_with(|| id.into());
    Candidate::document(text)
        .with_dense_score(1.0 - distance)
        .with_metadata(metadata)
}
