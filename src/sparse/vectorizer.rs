//! TF-IDF vectorizer producing L2-normalised sparse rows.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::{Analyzer, StandardAnalyzer};
use crate::error::{RagError, Result};

/// Configuration for the sparse index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparseIndexConfig {
    /// Maximum vocabulary size, keeping the most frequent terms.
    pub max_features: usize,
    /// Inclusive range of word n-gram lengths.
    pub ngram_range: (usize, usize),
    /// Drop English stop words before forming n-grams.
    pub stop_words: bool,
}

impl Default for SparseIndexConfig {
    fn default() -> Self {
        SparseIndexConfig {
            max_features: 10_000,
            ngram_range: (1, 2),
            stop_words: true,
        }
    }
}

impl SparseIndexConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_features == 0 {
            return Err(RagError::invalid_config("max_features must be at least 1"));
        }
        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(RagError::invalid_config(format!(
                "invalid ngram_range ({min_n}, {max_n}): need 1 <= min <= max"
            )));
        }
        Ok(())
    }
}

/// A sparse vector stored as `(column, value)` pairs sorted by column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(u32, f32)>,
}

impl SparseVector {
    /// Build from unsorted entries. Duplicate columns are summed.
    pub fn from_entries(mut entries: Vec<(u32, f32)>) -> Self {
        entries.sort_unstable_by_key(|(col, _)| *col);
        entries.dedup_by(|next, kept| {
            if next.0 == kept.0 {
                kept.1 += next.1;
                true
            } else {
                false
            }
        });
        SparseVector { entries }
    }

    /// The stored `(column, value)` pairs in column order.
    pub fn entries(&self) -> &[(u32, f32)] {
        &self.entries
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f32 {
        self.entries.iter().map(|(_, v)| v * v).sum::<f32>().sqrt()
    }

    /// Scale to unit length in place. A zero vector is left untouched.
    pub fn l2_normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for (_, value) in &mut self.entries {
                *value /= norm;
            }
        }
    }

    /// Dot product by merging the two sorted entry lists.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (a, b) = (&self.entries, &other.entries);
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < a.len() && j < b.len() {
            match a[i].0.cmp(&b[j].0) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += a[i].1 * b[j].1;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

/// TF-IDF vectorizer over word n-grams.
///
/// The vocabulary is fixed by [`fit`](Self::fit); terms unseen at fit time
/// are ignored by [`transform`](Self::transform).
#[derive(Clone)]
pub struct TfIdfVectorizer {
    config: SparseIndexConfig,
    analyzer: Arc<dyn Analyzer>,
    /// term -> column, columns assigned in alphabetical term order
    vocabulary: AHashMap<String, u32>,
    idf: Vec<f32>,
    n_documents: usize,
}

impl std::fmt::Debug for TfIdfVectorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfIdfVectorizer")
            .field("config", &self.config)
            .field("vocabulary_size", &self.vocabulary.len())
            .field("n_documents", &self.n_documents)
            .field("analyzer", &self.analyzer.name())
            .finish()
    }
}

impl TfIdfVectorizer {
    /// Create an unfitted vectorizer with the standard analyzer.
    pub fn new(config: SparseIndexConfig) -> Result<Self> {
        let analyzer: Arc<dyn Analyzer> = if config.stop_words {
            Arc::new(StandardAnalyzer::new()?)
        } else {
            Arc::new(StandardAnalyzer::without_stop_words()?)
        };
        Self::with_analyzer(config, analyzer)
    }

    /// Create an unfitted vectorizer with a custom analyzer.
    pub fn with_analyzer(config: SparseIndexConfig, analyzer: Arc<dyn Analyzer>) -> Result<Self> {
        config.validate()?;
        Ok(TfIdfVectorizer {
            config,
            analyzer,
            vocabulary: AHashMap::new(),
            idf: Vec::new(),
            n_documents: 0,
        })
    }

    /// Fit the vocabulary and IDF weights on `documents` and return their
    /// TF-IDF rows, one per document in input order.
    pub fn fit<S: AsRef<str> + Sync>(&mut self, documents: &[S]) -> Result<Vec<SparseVector>> {
        let counts: Vec<AHashMap<String, u32>> = documents
            .par_iter()
            .map(|doc| self.term_counts(doc.as_ref()))
            .collect::<Result<_>>()?;

        let mut corpus_frequency: AHashMap<&str, u64> = AHashMap::new();
        let mut document_frequency: AHashMap<&str, u32> = AHashMap::new();
        for doc_counts in &counts {
            for (term, count) in doc_counts {
                *corpus_frequency.entry(term.as_str()).or_insert(0) += u64::from(*count);
                *document_frequency.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let mut terms: Vec<(&str, u64)> = corpus_frequency.into_iter().collect();
        if terms.len() > self.config.max_features {
            terms.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            terms.truncate(self.config.max_features);
        }
        let mut kept: Vec<&str> = terms.into_iter().map(|(term, _)| term).collect();
        kept.sort_unstable();

        let n = documents.len() as f32;
        let mut vocabulary = AHashMap::with_capacity(kept.len());
        let mut idf = Vec::with_capacity(kept.len());
        for (column, term) in kept.iter().enumerate() {
            let df = document_frequency.get(term).copied().unwrap_or(0) as f32;
            vocabulary.insert((*term).to_string(), column as u32);
            idf.push(((1.0 + n) / (1.0 + df)).ln() + 1.0);
        }

        self.vocabulary = vocabulary;
        self.idf = idf;
        self.n_documents = documents.len();

        Ok(counts.iter().map(|c| self.weigh(c)).collect())
    }

    /// Map text into the fitted space and L2-normalise.
    pub fn transform(&self, text: &str) -> Result<SparseVector> {
        let counts = self.term_counts(text)?;
        Ok(self.weigh(&counts))
    }

    /// Number of terms in the fitted vocabulary.
    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Number of documents seen by the last fit.
    pub fn n_documents(&self) -> usize {
        self.n_documents
    }

    /// Whether [`fit`](Self::fit) has been called.
    pub fn is_fitted(&self) -> bool {
        self.n_documents > 0
    }

    /// Column of a term, if it is in the vocabulary.
    pub fn column(&self, term: &str) -> Option<u32> {
        self.vocabulary.get(term).copied()
    }

    /// IDF weight of a term, if it is in the vocabulary.
    pub fn idf(&self, term: &str) -> Option<f32> {
        self.column(term).map(|col| self.idf[col as usize])
    }

    /// The configuration this vectorizer was built with.
    pub fn config(&self) -> &SparseIndexConfig {
        &self.config
    }

    /// Raw n-gram counts for one text.
    fn term_counts(&self, text: &str) -> Result<AHashMap<String, u32>> {
        let words = self.analyzer.terms(text)?;
        let (min_n, max_n) = self.config.ngram_range;
        let mut counts = AHashMap::new();
        for n in min_n..=max_n {
            if n > words.len() {
                break;
            }
            for window in words.windows(n) {
                *counts.entry(window.join(" ")).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    fn weigh(&self, counts: &AHashMap<String, u32>) -> SparseVector {
        let entries = counts
            .iter()
            .filter_map(|(term, count)| {
                self.vocabulary
                    .get(term)
                    .map(|&col| (col, *count as f32 * self.idf[col as usize]))
            })
            .collect();
        let mut row = SparseVector::from_entries(entries);
        row.l2_normalize();
        row
    }

    /// Distinct vocabulary terms appearing in `text`.
    pub fn matched_terms(&self, text: &str) -> Result<Vec<String>> {
        let counts = self.term_counts(text)?;
        let mut seen: AHashSet<String> = AHashSet::new();
        for term in counts.into_keys() {
            if self.vocabulary.contains_key(&term) {
                seen.insert(term);
            }
        }
        let mut terms: Vec<String> = seen.into_iter().collect();
        terms.sort();
        Ok(terms)
    }
}
