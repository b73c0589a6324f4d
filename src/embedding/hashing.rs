//! Deterministic feature-hashing embedder.

use std::sync::Arc;

use async_trait::async_trait;

use crate::analysis::analyzer::{Analyzer, StandardAnalyzer};
use crate::embedding::text_embedder::TextEmbedder;
use crate::error::{RagError, Result};
use crate::vector::Vector;

/// Default number of hash buckets.
pub const DEFAULT_HASHING_DIMENSION: usize = 384;

/// Embeds text by hashing its unigrams and bigrams into a fixed number of
/// signed buckets and L2-normalising the result.
///
/// Texts sharing vocabulary land close together under cosine distance, which
/// is enough for offline use, demos and tests. Text without any indexable
/// term embeds to the zero vector.
#[derive(Clone)]
pub struct HashingTextEmbedder {
    dimension: usize,
    analyzer: Arc<dyn Analyzer>,
    name: String,
}

impl std::fmt::Debug for HashingTextEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashingTextEmbedder")
            .field("dimension", &self.dimension)
            .field("analyzer", &self.analyzer.name())
            .finish()
    }
}

impl HashingTextEmbedder {
    /// Create an embedder with [`DEFAULT_HASHING_DIMENSION`] buckets.
    pub fn new() -> Result<Self> {
        Self::with_dimension(DEFAULT_HASHING_DIMENSION)
    }

    /// Create an embedder with `dimension` buckets.
    pub fn with_dimension(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::invalid_config(
                "hashing embedder dimension must be at least 1",
            ));
        }
        Ok(HashingTextEmbedder {
            dimension,
            analyzer: Arc::new(StandardAnalyzer::new()?),
            name: format!("hashing-{dimension}"),
        })
    }

    fn embed_sync(&self, text: &str) -> Result<Vector> {
        let terms = self.analyzer.terms(text)?;
        let mut data = vec![0.0f32; self.dimension];

        let bigrams = terms.windows(2).map(|pair| format!("{} {}", pair[0], pair[1]));
        for (feature, weight) in terms
            .iter()
            .cloned()
            .map(|t| (t, 1.0f32))
            .chain(bigrams.map(|b| (b, 0.5f32)))
        {
            let hash = crc32fast::hash(feature.as_bytes());
            let bucket = hash as usize % self.dimension;
            // top bit picks the sign so collisions tend to cancel
            let sign = if hash & 0x8000_0000 == 0 { 1.0 } else { -1.0 };
            data[bucket] += sign * weight;
        }

        let mut vector = Vector::new(data);
        vector.normalize();
        Ok(vector)
    }
}

#[async_trait]
impl TextEmbedder for HashingTextEmbedder {
    async fn embed(&self, text: &str) -> Result<Vector> {
        self.embed_sync(text)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vector>> {
        texts.iter().map(|text| self.embed_sync(text)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.name
    }
}
