//! Text embedding trait used by the dense retriever and document ingestion.

use async_trait::async_trait;

use crate::error::Result;
use crate::vector::Vector;

/// Trait for converting text to vector embeddings.
///
/// Implementations must be deterministic for a fixed model version.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use hybrid_rag::embedding::TextEmbedder;
/// use hybrid_rag::error::Result;
/// use hybrid_rag::vector::Vector;
///
/// struct ConstantEmbedder;
///
/// #[async_trait]
/// impl TextEmbedder for ConstantEmbedder {
///     async fn embed(&self, _text: &str) -> Result<Vector> {
///         Ok(Vector::new(vec![1.0, 0.0]))
///     }
///
///     fn dimension(&self) -> usize {
///         2
///     }
/// }
/// ```
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Generate an embedding vector for the given text.
    async fn embed(&self, text: &str) -> Result<Vector>;

    /// Generate embeddings for multiple texts, one per input in order.
    ///
    /// The default implementation calls `embed` sequentially.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vector>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// The number of dimensions in the produced vectors.
    fn dimension(&self) -> usize;

    /// Model identity, used in logs to spot index/query mismatches.
    fn name(&self) -> &str {
        "unknown"
    }
}
