//! Error types for the hybrid-rag library.
//!
//! Every fallible operation returns [`RagError`] through the crate-wide
//! [`Result`] alias. Stage-level failures (an unreachable vector index, a
//! failing cross-encoder, a slow web page) are ordinary variants here so that
//! the search orchestrator can decide whether to degrade or to give up.
//!
//! # Examples
//!
//! ```
//! use hybrid_rag::error::{RagError, Result};
//!
//! fn check_weight(weight: f32) -> Result<()> {
//!     if !(0.0..=1.0).contains(&weight) {
//!         return Err(RagError::invalid_config("weight must be within [0, 1]"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_weight(0.7).is_ok());
//! assert!(check_weight(1.5).is_err());
//! ```

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::retrieval::candidate::RetrievalPath;

/// The main error type for hybrid-rag operations.
#[derive(Error, Debug)]
pub enum RagError {
    /// I/O errors (config files, corpus files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level HTTP errors from an external collaborator.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A retrieval path (vector index, sparse index, web search) could not be used.
    #[error("{path} retrieval unavailable: {reason}")]
    RetrievalUnavailable { path: RetrievalPath, reason: String },

    /// The pairwise relevance model could not produce scores.
    #[error("Scoring unavailable: {0}")]
    ScoringUnavailable(String),

    /// A call to an external service exceeded its time budget.
    #[error("{operation} timed out after {timeout:?}")]
    ExternalTimeout { operation: String, timeout: Duration },

    /// Every attempted retrieval path failed for a single query.
    #[error("Search failed: {}", join_causes(.causes))]
    SearchFailed { causes: Vec<RagError> },

    /// Embedding generation errors.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Text analysis errors (tokenization, filtering).
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Configuration validation errors.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid caller input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error.
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with [`RagError`].
pub type Result<T> = std::result::Result<T, RagError>;

fn join_causes(causes: &[RagError]) -> String {
    if causes.is_empty() {
        return "no cause recorded".to_string();
    }
    causes
        .iter()
        .map(|cause| cause.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl RagError {
    /// Create a new retrieval-unavailable error for the given path.
    pub fn retrieval_unavailable<S: Into<String>>(path: RetrievalPath, reason: S) -> Self {
        RagError::RetrievalUnavailable {
            path,
            reason: reason.into(),
        }
    }

    /// Create a new scoring-unavailable error.
    pub fn scoring_unavailable<S: Into<String>>(msg: S) -> Self {
        RagError::ScoringUnavailable(msg.into())
    }

    /// Create a new timeout error for an external call.
    pub fn timeout<S: Into<String>>(operation: S, timeout: Duration) -> Self {
        RagError::ExternalTimeout {
            operation: operation.into(),
            timeout,
        }
    }

    /// Create a new embedding error.
    pub fn embedding<S: Into<String>>(msg: S) -> Self {
        RagError::Embedding(msg.into())
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        RagError::Analysis(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        RagError::InvalidConfig(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        RagError::InvalidArgument(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        RagError::Other(msg.into())
    }

    /// Re-tag a collaborator failure as an unavailable retrieval path.
    ///
    /// Timeouts and errors already tagged with a path pass through unchanged.
    pub fn into_unavailable(self, path: RetrievalPath) -> Self {
        match self {
            RagError::ExternalTimeout { .. } | RagError::RetrievalUnavailable { .. } => self,
            other => RagError::retrieval_unavailable(path, other.to_string()),
        }
    }

    /// Whether this error is an exceeded time budget.
    pub fn is_timeout(&self) -> bool {
        match self {
            RagError::ExternalTimeout { .. } => true,
            RagError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Whether a pipeline stage may swallow this error and continue with a
    /// degraded result instead of failing the query.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            RagError::RetrievalUnavailable { .. }
                | RagError::ScoringUnavailable(_)
                | RagError::ExternalTimeout { .. }
                | RagError::Http(_)
                | RagError::Embedding(_)
        )
    }
}
