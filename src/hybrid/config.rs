//! Configuration for hybrid search.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chunking::ChunkingConfig;
use crate::error::{RagError, Result};
use crate::rerank::RerankConfig;
use crate::retrieval::{DenseRetrieverConfig, IdentityKey};
use crate::sparse::SparseIndexConfig;
use crate::web::WebSearchConfig;

/// Configuration for the hybrid search engine.
///
/// Every field has a default, so a JSON file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridSearchConfig {
    /// Weight of dense similarity in document fusion.
    pub dense_weight: f32,
    /// Weight of sparse similarity in document fusion.
    pub sparse_weight: f32,
    /// Weight of the fused document list when web results are mixed in.
    pub document_weight: f32,
    /// Weight of web relevance when web results are mixed in.
    pub web_weight: f32,
    /// Results returned when a request does not say.
    pub max_results: usize,
    /// Mix in web results in hybrid mode when a web provider is configured.
    pub include_web: bool,
    /// Deduplication key strategy.
    pub identity_key: IdentityKey,
    pub dense: DenseRetrieverConfig,
    pub sparse: SparseIndexConfig,
    pub rerank: RerankConfig,
    pub web: WebSearchConfig,
    pub chunking: ChunkingConfig,
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        HybridSearchConfig {
            dense_weight: 0.7,
            sparse_weight: 0.3,
            document_weight: 0.6,
            web_weight: 0.4,
            max_results: 10,
            include_web: true,
            identity_key: IdentityKey::default(),
            dense: DenseRetrieverConfig::default(),
            sparse: SparseIndexConfig::default(),
            rerank: RerankConfig::default(),
            web: WebSearchConfig::default(),
            chunking: ChunkingConfig::default(),
        }
    }
}

impl HybridSearchConfig {
    /// Validate this configuration and every nested one.
    pub fn validate(&self) -> Result<()> {
        for (name, weight) in [
            ("dense_weight", self.dense_weight),
            ("sparse_weight", self.sparse_weight),
            ("document_weight", self.document_weight),
            ("web_weight", self.web_weight),
        ] {
            validate_weight(name, weight)?;
        }
        if self.max_results == 0 {
            return Err(RagError::invalid_config("max_results must be at least 1"));
        }
        if let IdentityKey::Prefix { chars: 0 } = self.identity_key {
            return Err(RagError::invalid_config(
                "identity key prefix must be at least 1 character",
            ));
        }
        if self.dense.embed_timeout.is_zero() || self.dense.query_timeout.is_zero() {
            return Err(RagError::invalid_config("dense timeouts must be non-zero"));
        }
        self.sparse.validate()?;
        self.rerank.validate()?;
        self.web.validate()?;
        self.chunking.validate()?;
        Ok(())
    }

    /// Load and validate a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: HybridSearchConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Check that a fusion weight lies in [0, 1].
pub(crate) fn validate_weight(name: &str, weight: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&weight) {
        return Err(RagError::invalid_config(format!(
            "{name} must be within [0, 1], got {weight}"
        )));
    }
    Ok(())
}
