//! Flat-scan in-memory vector index.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use rayon::prelude::*;

use crate::error::{RagError, Result};
use crate::retrieval::candidate::RetrievalPath;
use crate::vector::distance::cosine_distance;
use crate::vector::index::{MetadataFilter, VectorHit, VectorIndex, VectorRecord};
use crate::vector::Vector;

/// Scan in parallel once the index holds at least this many records.
const PARALLEL_SCAN_THRESHOLD: usize = 1024;

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, VectorRecord>,
    dimension: Option<usize>,
}

/// An exact nearest-neighbour index that scans every stored vector.
///
/// The vector dimension is pinned by the first upsert; vectors of any other
/// dimension are rejected on write, and queries with a different dimension
/// fail as an unavailable dense path. A dimension change is the visible
/// symptom of swapping the embedding model between index time and query time.
///
/// Distances are cosine distances.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    inner: RwLock<Inner>,
}

impl InMemoryVectorIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// The pinned vector dimension, if any record was ever stored.
    pub fn dimension(&self) -> Option<usize> {
        self.inner.read().dimension
    }

    fn score_records(
        &self,
        records: &[&VectorRecord],
        query: &Vector,
    ) -> Result<Vec<(usize, f32)>> {
        let distance = |(idx, record): (usize, &&VectorRecord)| {
            cosine_distance(&query.data, &record.vector.data).map(|d| (idx, d))
        };

        if records.len() >= PARALLEL_SCAN_THRESHOLD {
            records.par_iter().enumerate().map(distance).collect()
        } else {
            records.iter().enumerate().map(distance).collect()
        }
    }
}

/// Check that every record is finite and shares one dimension, pinned or
/// taken from the first record. Returns that dimension.
fn validate_records(pinned: Option<usize>, records: &[VectorRecord]) -> Result<Option<usize>> {
    let mut dimension = pinned;
    for record in records {
        if !record.vector.is_valid() {
            return Err(RagError::invalid_argument(format!(
                "Vector for record {} contains NaN or infinite values",
                record.id
            )));
        }
        match dimension {
            Some(expected) => record.vector.validate_dimension(expected)?,
            None => dimension = Some(record.vector.dimension()),
        }
    }
    Ok(dimension)
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, record: VectorRecord) -> Result<()> {
        self.upsert_batch(vec![record]).await
    }

    /// All-or-nothing: one invalid record leaves the index untouched.
    async fn upsert_batch(&self, records: Vec<VectorRecord>) -> Result<()> {
        let mut inner = self.inner.write();
        let dimension = validate_records(inner.dimension, &records)?;
        inner.dimension = dimension;
        for record in records {
            inner.records.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &Vector,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorHit>> {
        let inner = self.inner.read();
        if inner.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if let Some(dimension) = inner.dimension {
            vector.validate_dimension(dimension).map_err(|e| {
                RagError::retrieval_unavailable(RetrievalPath::Dense, e.to_string())
            })?;
        }

        let candidates: Vec<&VectorRecord> = inner
            .records
            .values()
            .filter(|record| filter.is_none_or(|f| f.matches(&record.metadata)))
            .collect();

        let mut scored = self.score_records(&candidates, vector)?;
        scored.sort_by(|(a_idx, a), (b_idx, b)| {
            a.total_cmp(b)
                .then_with(|| candidates[*a_idx].id.cmp(&candidates[*b_idx].id))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(idx, distance)| {
                let record = candidates[idx];
                VectorHit {
                    id: record.id.clone(),
                    text: record.text.clone(),
                    metadata: record.metadata.clone(),
                    distance,
                }
            })
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut inner = self.inner.write();
        let removed = ids
            .iter()
            .filter(|id| inner.records.remove(id.as_str()).is_some())
            .count();
        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.inner.read().records.len())
    }
}
