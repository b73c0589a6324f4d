//! Immutable snapshot of a fitted sparse index.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::retrieval::candidate::Metadata;
use crate::sparse::vectorizer::{SparseIndexConfig, SparseVector, TfIdfVectorizer};
use crate::util::score_desc;

/// Row count above which similarity scoring is spread across threads.
const PARALLEL_SCAN_THRESHOLD: usize = 2048;

/// One document (or chunk) text covered by the sparse index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusEntry {
    /// Stable identifier, e.g. `<doc_id>_chunk_<i>`.
    pub id: String,
    /// The indexed text.
    pub text: String,
    /// Provenance copied onto the candidates built from this entry.
    #[serde(default)]
    pub metadata: Metadata,
}

impl CorpusEntry {
    pub fn new<I: Into<String>, T: Into<String>>(id: I, text: T) -> Self {
        CorpusEntry {
            id: id.into(),
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A vectorizer fitted over a corpus, the corpus rows in TF-IDF space, and
/// the corpus entries themselves.
///
/// Never mutated after construction. The vocabulary is tied to the corpus
/// it was fitted on, so any corpus change means building a new index.
#[derive(Debug, Clone)]
pub struct FittedIndex {
    vectorizer: TfIdfVectorizer,
    rows: Vec<SparseVector>,
    entries: Vec<CorpusEntry>,
}

impl FittedIndex {
    /// Fit a new index over `entries`.
    pub fn build(entries: Vec<CorpusEntry>, config: SparseIndexConfig) -> Result<Self> {
        let vectorizer = TfIdfVectorizer::new(config)?;
        Self::build_with(vectorizer, entries)
    }

    /// Fit a new index using a prepared (unfitted) vectorizer.
    pub fn build_with(mut vectorizer: TfIdfVectorizer, entries: Vec<CorpusEntry>) -> Result<Self> {
        let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
        let rows = vectorizer.fit(&texts)?;
        if vectorizer.vocabulary_size() == 0 {
            log::warn!(
                "sparse index fitted over {} entries has an empty vocabulary",
                entries.len()
            );
        }
        Ok(FittedIndex {
            vectorizer,
            rows,
            entries,
        })
    }

    /// Cosine similarity of `query` against every row, keeping the top `k`
    /// nonzero matches as `(row, similarity)`.
    ///
    /// Ordered by similarity descending, then row ascending.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<(usize, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query = self.vectorizer.transform(query)?;
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let score = |(row, vector): (usize, &SparseVector)| {
            let sim = vector.dot(&query);
            (sim > 0.0).then_some((row, sim.min(1.0)))
        };
        let mut hits: Vec<(usize, f32)> = if self.rows.len() >= PARALLEL_SCAN_THRESHOLD {
            self.rows.par_iter().enumerate().filter_map(score).collect()
        } else {
            self.rows.iter().enumerate().filter_map(score).collect()
        };

        hits.sort_by(|a, b| score_desc(a.1, b.1).then_with(|| a.0.cmp(&b.0)));
        hits.truncate(k);
        Ok(hits)
    }

    /// The corpus entry at `row`.
    pub fn entry(&self, row: usize) -> Option<&CorpusEntry> {
        self.entries.get(row)
    }

    /// All corpus entries in row order.
    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn vectorizer(&self) -> &TfIdfVectorizer {
        &self.vectorizer
    }
}
