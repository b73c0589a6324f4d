//! The vector index collaborator interface.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::retrieval::candidate::Metadata;
use crate::vector::Vector;

/// A chunk of text stored in the vector index with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique record id (for example `<document_id>_chunk_<n>`).
    pub id: String,
    /// The embedding of `text`.
    pub vector: Vector,
    /// The text that was embedded.
    pub text: String,
    /// Provenance details.
    pub metadata: Metadata,
}

impl VectorRecord {
    /// Create a new record with empty metadata.
    pub fn new<I: Into<String>, T: Into<String>>(id: I, vector: Vector, text: T) -> Self {
        Self {
            id: id.into(),
            vector,
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Attach metadata to this record.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A nearest-neighbour result from [`VectorIndex::query`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    /// Record id.
    pub id: String,
    /// Stored text.
    pub text: String,
    /// Stored metadata.
    pub metadata: Metadata,
    /// Distance from the query vector (cosine distance for cosine indexes).
    pub distance: f32,
}

/// Equality filter over record metadata. Every listed key must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    conditions: HashMap<String, Value>,
}

impl MetadataFilter {
    /// Create an empty filter (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to equal `value`.
    pub fn eq<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    /// Check whether a metadata map satisfies this filter.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected))
    }

    /// Whether the filter has no conditions.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// A persistent (or in-memory) store of embedded text chunks.
///
/// Implementations must be safe for concurrent reads; the core only issues
/// read queries and append-style upserts.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace a record.
    async fn upsert(&self, record: VectorRecord) -> Result<()>;

    /// Insert or replace several records.
    async fn upsert_batch(&self, records: Vec<VectorRecord>) -> Result<()> {
        for record in records {
            self.upsert(record).await?;
        }
        Ok(())
    }

    /// Return up to `k` nearest records to `vector`, ascending by distance.
    async fn query(
        &self,
        vector: &Vector,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorHit>>;

    /// Delete records by id. Returns the number of records removed.
    async fn delete(&self, ids: &[String]) -> Result<usize>;

    /// Number of stored records.
    async fn len(&self) -> Result<usize>;

    /// Whether the index holds no records.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_filter_matches() {
        let mut metadata = Metadata::new();
        metadata.insert("department".to_string(), json!("engineering"));
        metadata.insert("chunk_index".to_string(), json!(2));

        assert!(MetadataFilter::new().matches(&metadata));
        assert!(
            MetadataFilter::new()
                .eq("department", "engineering")
                .matches(&metadata)
        );
        assert!(
            MetadataFilter::new()
                .eq("department", "engineering")
                .eq("chunk_index", 2)
                .matches(&metadata)
        );
        assert!(!MetadataFilter::new().eq("department", "sales").matches(&metadata));
        assert!(!MetadataFilter::new().eq("missing", true).matches(&metadata));
    }
}
