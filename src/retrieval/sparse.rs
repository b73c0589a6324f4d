//! Sparse (TF-IDF) retrieval over a published [`FittedIndex`] snapshot.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{RagError, Result};
use crate::retrieval::candidate::{Candidate, RetrievalPath};
use crate::sparse::{CorpusEntry, FittedIndex, SparseIndexConfig};

/// Lexical retriever owning the fitted sparse index.
///
/// Readers clone the current `Arc<FittedIndex>` and work on that snapshot, so
/// a refit never disturbs an in-flight query. A refit builds the new index
/// without holding the lock and then swaps it in.
#[derive(Debug)]
pub struct SparseRetriever {
    config: SparseIndexConfig,
    snapshot: RwLock<Option<Arc<FittedIndex>>>,
}

impl SparseRetriever {
    pub fn new(config: SparseIndexConfig) -> Result<Self> {
        config.validate()?;
        Ok(SparseRetriever {
            config,
            snapshot: RwLock::new(None),
        })
    }

    /// Fit a new index over `entries` and publish it.
    ///
    /// An empty corpus unpublishes the current index.
    pub fn fit(&self, entries: Vec<CorpusEntry>) -> Result<()> {
        if entries.is_empty() {
            log::info!("sparse index cleared: corpus is empty");
            self.clear();
            return Ok(());
        }
        let count = entries.len();
        let index = FittedIndex::build(entries, self.config.clone())?;
        let terms = index.vectorizer().vocabulary_size();
        self.publish(index);
        log::info!("sparse index fitted on {count} entries ({terms} terms)");
        Ok(())
    }

    /// Publish an index built elsewhere.
    pub fn publish(&self, index: FittedIndex) {
        *self.snapshot.write() = Some(Arc::new(index));
    }

    /// Drop the published index; retrievals report the index as not fitted.
    pub fn clear(&self) {
        *self.snapshot.write() = None;
    }

    /// The currently published index, if any.
    pub fn snapshot(&self) -> Option<Arc<FittedIndex>> {
        self.snapshot.read().clone()
    }

    pub fn is_fitted(&self) -> bool {
        self.snapshot.read().is_some()
    }

    pub fn config(&self) -> &SparseIndexConfig {
        &self.config
    }

    /// Up to `k` candidates with nonzero TF-IDF cosine similarity, ordered
    /// by similarity descending and then by corpus position.
    pub fn try_retrieve(&self, query: &str, k: usize) -> Result<Vec<Candidate>> {
        if query.trim().is_empty() {
            return Err(RagError::invalid_argument("query must not be empty"));
        }
        let index = self
            .snapshot()
            .ok_or_else(|| RagError::retrieval_unavailable(RetrievalPath::Sparse, "index not fitted"))?;

        let hits = index
            .search(query, k)
            .map_err(|e| e.into_unavailable(RetrievalPath::Sparse))?;

        Ok(hits
            .into_iter()
            .filter_map(|(row, sim)| {
                index.entry(row).map(|entry| {
                    Candidate::document(entry.text.clone())
                        .with_sparse_score(sim)
                        .with_metadata(entry.metadata.clone())
                        .with_metadata_entry("chunk_id", entry.id.clone())
                })
            })
            .collect())
    }

    /// Like [`try_retrieve`](Self::try_retrieve), but a failure is logged and
    /// degrades to an empty list.
    pub fn retrieve(&self, query: &str, k: usize) -> Vec<Candidate> {
        match self.try_retrieve(query, k) {
            Ok(candidates) => candidates,
            Err(e) => {
                log::warn!("sparse retrieval degraded to no results: {e}");
                Vec::new()
            }
        }
    }
}
