//! Cross-encoder scoring collaborators.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// A model that jointly encodes a query and a passage into one relevance score.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    /// Score every `(query, passage)` pair. The output has one score per
    /// passage, in input order.
    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>>;

    /// Model identity for logs.
    fn name(&self) -> &str {
        "cross-encoder"
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [&'a str],
    raw_scores: bool,
    truncate: bool,
}

#[derive(Debug, Deserialize)]
struct RerankEntry {
    index: usize,
    score: f32,
}

/// Client for a text-embeddings-inference style `POST /rerank` endpoint.
///
/// The server answers `[{"index": i, "score": s}, ...]`, usually sorted by
/// score; results are put back into input order.
#[derive(Debug, Clone)]
pub struct HttpCrossEncoder {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    name: String,
}

impl HttpCrossEncoder {
    /// `base_url` is the server root, e.g. `http://localhost:8081`.
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        let base_url = base_url.into();
        let endpoint = format!("{}/rerank", base_url.trim_end_matches('/'));
        HttpCrossEncoder {
            client: Client::new(),
            endpoint,
            api_key: None,
            name: "http-cross-encoder".to_string(),
        }
    }

    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Label used in logs, typically the served model id.
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Put `[{index, score}]` entries back into input order.
fn reorder(entries: Vec<RerankEntry>, expected: usize) -> Result<Vec<f32>> {
    if entries.len() != expected {
        return Err(RagError::scoring_unavailable(format!(
            "expected {expected} scores, got {}",
            entries.len()
        )));
    }
    let mut scores: Vec<Option<f32>> = vec![None; expected];
    for entry in entries {
        let Some(slot) = scores.get_mut(entry.index).filter(|slot| slot.is_none()) else {
            return Err(RagError::scoring_unavailable(format!(
                "invalid or repeated result index {}",
                entry.index
            )));
        };
        *slot = Some(entry.score);
    }
    // every slot is filled: `expected` distinct in-range indices were seen
    Ok(scores.into_iter().flatten().collect())
}

#[async_trait]
impl CrossEncoder for HttpCrossEncoder {
    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }
        let request = RerankRequest {
            query,
            texts: passages,
            raw_scores: false,
            truncate: true,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| RagError::scoring_unavailable(format!("rerank request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::scoring_unavailable(format!(
                "rerank endpoint returned {status}: {body}"
            )));
        }
        let entries: Vec<RerankEntry> = response.json().await.map_err(|e| {
            RagError::scoring_unavailable(format!("failed to parse rerank response: {e}"))
        })?;

        reorder(entries, passages.len())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: usize, score: f32) -> RerankEntry {
        RerankEntry { index, score }
    }

    #[test]
    fn test_reorder_restores_input_order() {
        let scores = reorder(vec![entry(2, 0.9), entry(0, 0.5), entry(1, 0.1)], 3).unwrap();
        assert_eq!(scores, vec![0.5, 0.1, 0.9]);
    }

    #[test]
    fn test_reorder_rejects_bad_responses() {
        assert!(reorder(vec![entry(0, 0.5)], 2).is_err());
        assert!(reorder(vec![entry(0, 0.5), entry(0, 0.4)], 2).is_err());
        assert!(reorder(vec![entry(0, 0.5), entry(5, 0.4)], 2).is_err());
    }

    #[test]
    fn test_endpoint_normalised() {
        let encoder = HttpCrossEncoder::new("http://localhost:8081/").with_name("bge-reranker-base");
        assert_eq!(encoder.endpoint(), "http://localhost:8081/rerank");
        assert_eq!(encoder.name(), "bge-reranker-base");
    }

    #[test]
    fn test_request_shape() {
        let texts = ["a", "b"];
        let request = RerankRequest {
            query: "q",
            texts: &texts,
            raw_scores: false,
            truncate: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["texts"].as_array().unwrap().len(), 2);
        assert_eq!(json["query"], "q");
    }
}
