//! # hybrid-rag
//!
//! Hybrid retrieval for retrieval-augmented generation.
//!
//! ## Features
//!
//! - Dense retrieval over a vector index with pluggable embedders
//! - TF-IDF sparse retrieval with atomically swapped index snapshots
//! - Weighted score fusion with content-identity deduplication
//! - Cross-encoder re-ranking that degrades to fusion order
//! - Optional web search with credibility and relevance heuristics
//! - Document chunking and citation-annotated context formatting

pub mod analysis;
pub mod chunking;
pub mod cli;
pub mod context;
pub mod embedding;
pub mod error;
pub mod hybrid;
pub mod rerank;
pub mod retrieval;
pub mod sparse;
pub mod util;
pub mod vector;
pub mod web;

pub mod prelude {
    pub use crate::error::{RagError, Result};
    pub use crate::hybrid::{
        HybridSearchConfig, HybridSearchEngine, HybridSearchRequest, HybridSearchResults,
        SearchMode,
    };
    pub use crate::retrieval::{Candidate, Metadata, SourceType};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
