//! Blends cross-encoder scores into the fused ranking.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::rerank::cross_encoder::CrossEncoder;
use crate::retrieval::candidate::Candidate;
use crate::util::{score_desc, with_timeout};

/// Re-ranking weights and time budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    /// Weight of the fusion score in `final_score`.
    pub combined_weight: f32,
    /// Weight of the cross-encoder score in `final_score`.
    pub rerank_weight: f32,
    /// Budget for one cross-encoder batch.
    pub timeout: Duration,
}

impl Default for RerankConfig {
    fn default() -> Self {
        RerankConfig {
            combined_weight: 0.7,
            rerank_weight: 0.3,
            timeout: Duration::from_secs(30),
        }
    }
}

impl RerankConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, weight) in [
            ("combined_weight", self.combined_weight),
            ("rerank_weight", self.rerank_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(RagError::invalid_config(format!(
                    "{name} must be within [0, 1], got {weight}"
                )));
            }
        }
        if self.timeout.is_zero() {
            return Err(RagError::invalid_config("rerank timeout must be non-zero"));
        }
        Ok(())
    }
}

/// Applies the cross-encoder to a fused candidate list.
///
/// Without a cross-encoder the reranker passes candidates through in
/// `combined_score` order.
#[derive(Clone, Default)]
pub struct Reranker {
    encoder: Option<Arc<dyn CrossEncoder>>,
    config: RerankConfig,
}

impl std::fmt::Debug for Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reranker")
            .field("encoder", &self.encoder.as_ref().map(|e| e.name().to_string()))
            .field("config", &self.config)
            .finish()
    }
}

impl Reranker {
    pub fn new(encoder: Arc<dyn CrossEncoder>) -> Self {
        Reranker {
            encoder: Some(encoder),
            config: RerankConfig::default(),
        }
    }

    /// A reranker that never calls a model.
    pub fn passthrough() -> Self {
        Reranker::default()
    }

    pub fn with_config(mut self, config: RerankConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RerankConfig {
        &self.config
    }

    pub fn has_encoder(&self) -> bool {
        self.encoder.is_some()
    }

    /// Re-rank `candidates` and keep the best `top_k`.
    ///
    /// Returns `min(top_k, candidates.len())` candidates sorted by
    /// `final_score` descending. An empty list never reaches the model. If
    /// scoring fails or times out, the result is the input ordered by
    /// `combined_score`, truncated, with no rerank scores attached.
    pub async fn rerank(&self, query: &str, candidates: Vec<Candidate>, top_k: usize) -> Vec<Candidate> {
        if candidates.is_empty() || top_k == 0 {
            return Vec::new();
        }
        if self.encoder.is_none() {
            return order_by_combined(candidates, top_k);
        }
        match self.try_rerank(query, &candidates, top_k).await {
            Ok(reranked) => reranked,
            Err(e) => {
                log::warn!("re-ranking degraded to fusion order: {e}");
                order_by_combined(candidates, top_k)
            }
        }
    }

    /// Re-rank without the fallback, reporting why scoring failed.
    pub async fn try_rerank(
        &self,
        query: &str,
        candidates: &[Candidate],
        top_k: usize,
    ) -> Result<Vec<Candidate>> {
        let Some(encoder) = &self.encoder else {
            return Err(RagError::scoring_unavailable("no cross-encoder configured"));
        };
        if candidates.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let passages: Vec<&str> = candidates.iter().map(|c| c.content.as_str()).collect();
        let scores = with_timeout(
            "cross-encoder scoring",
            self.config.timeout,
            encoder.score(query, &passages),
        )
        .await?;

        if scores.len() != candidates.len() {
            return Err(RagError::scoring_unavailable(format!(
                "{} returned {} scores for {} passages",
                encoder.name(),
                scores.len(),
                candidates.len()
            )));
        }
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(RagError::scoring_unavailable(format!(
                "{} returned a non-finite score",
                encoder.name()
            )));
        }

        let mut reranked: Vec<Candidate> = candidates
            .iter()
            .zip(scores)
            .map(|(candidate, score)| {
                let mut candidate = candidate.clone();
                candidate.rerank_score = Some(score);
                candidate.final_score = Some(
                    candidate.combined_score * self.config.combined_weight
                        + score * self.config.rerank_weight,
                );
                candidate
            })
            .collect();
        reranked.sort_by(|a, b| score_desc(a.ranking_score(), b.ranking_score()));
        reranked.truncate(top_k);

        log::debug!(
            "re-ranked {} candidates with {}, kept {}",
            candidates.len(),
            encoder.name(),
            reranked.len()
        );
        Ok(reranked)
    }
}

fn order_by_combined(mut candidates: Vec<Candidate>, top_k: usize) -> Vec<Candidate> {
    for candidate in &mut candidates {
        candidate.clear_rerank();
    }
    candidates.sort_by(|a, b| score_desc(a.combined_score, b.combined_score));
    candidates.truncate(top_k);
    candidates
}
