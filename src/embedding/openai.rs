//! OpenAI-compatible embeddings API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::embedding::text_embedder::TextEmbedder;
use crate::error::{RagError, Result};
use crate::vector::Vector;

/// Default API root; any OpenAI-compatible server can be used instead.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Request structure for the embeddings endpoint.
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    /// Only sent when a non-default dimension was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Text embedder backed by an OpenAI-compatible `/embeddings` endpoint.
///
/// # Examples
///
/// ```no_run
/// use hybrid_rag::embedding::{OpenAiTextEmbedder, TextEmbedder};
///
/// # async fn example() -> hybrid_rag::error::Result<()> {
/// let embedder = OpenAiTextEmbedder::new(
///     std::env::var("OPENAI_API_KEY").unwrap_or_default(),
///     "text-embedding-3-small".to_string(),
/// )?;
///
/// let vectors = embedder.embed_batch(&["Hello", "World"]).await?;
/// assert_eq!(vectors.len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OpenAiTextEmbedder {
    client: Client,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
}

impl OpenAiTextEmbedder {
    /// Create an embedder for one of the known OpenAI embedding models.
    ///
    /// Supported models:
    /// - `text-embedding-3-small` (1536 dimensions)
    /// - `text-embedding-3-large` (3072 dimensions)
    /// - `text-embedding-ada-002` (1536 dimensions)
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let dimension = Self::default_dimension(&model).ok_or_else(|| {
            RagError::invalid_config(format!(
                "Unknown OpenAI embedding model: {model}. Supported models: \
                 text-embedding-3-small, text-embedding-3-large, text-embedding-ada-002"
            ))
        })?;
        Self::with_dimension(api_key, model, dimension)
    }

    /// Create an embedder with an explicit output dimension.
    ///
    /// Also the entry point for non-OpenAI models served behind a compatible API.
    pub fn with_dimension(api_key: String, model: String, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::invalid_config(
                "embedding dimension must be at least 1",
            ));
        }
        Ok(Self {
            client: Client::new(),
            api_key,
            model,
            dimension,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API root (e.g. a local server).
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set a transport-level request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    fn default_dimension(model: &str) -> Option<usize> {
        match model {
            "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
            "text-embedding-3-large" => Some(3072),
            _ => None,
        }
    }

    async fn request(&self, input: Vec<&str>) -> Result<Vec<Vector>> {
        let expected = input.len();
        let dimensions = match Self::default_dimension(&self.model) {
            Some(default) if default == self.dimension => None,
            _ => Some(self.dimension),
        };
        let request = EmbeddingRequest {
            model: &self.model,
            input,
            dimensions,
        };

        let http_response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = http_response.status();
        let response_text = http_response.text().await?;
        if !status.is_success() {
            return Err(RagError::embedding(format!(
                "embeddings API error (status {status}): {response_text}"
            )));
        }

        let mut response: EmbeddingResponse =
            serde_json::from_str(&response_text).map_err(|e| {
                RagError::embedding(format!("failed to parse embeddings response: {e}"))
            })?;
        if response.data.len() != expected {
            return Err(RagError::embedding(format!(
                "expected {expected} embeddings, got {}",
                response.data.len()
            )));
        }
        response.data.sort_by_key(|d| d.index);

        Ok(response
            .data
            .into_iter()
            .map(|d| Vector::new(d.embedding))
            .collect())
    }
}

#[async_trait]
impl TextEmbedder for OpenAiTextEmbedder {
    async fn embed(&self, text: &str) -> Result<Vector> {
        self.request(vec![text])
            .await?
            .pop()
            .ok_or_else(|| RagError::embedding("No embedding in response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts.to_vec()).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}
