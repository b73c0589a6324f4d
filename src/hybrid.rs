//! The hybrid search orchestrator.
//!
//! [`HybridSearchEngine`] runs one query through the full pipeline:
//! dense and sparse retrieval, fusion, an optional web pass fused with its
//! own weights, and a final re-rank. It also owns document ingestion, so the
//! vector index and the sparse index always describe the same chunks.
//!
//! # Examples
//!
//! ```
//! use hybrid_rag::hybrid::{HybridSearchEngine, HybridSearchRequest, SearchMode};
//! use hybrid_rag::retrieval::Metadata;
//!
//! # tokio_test::block_on(async {
//! let engine = HybridSearchEngine::builder().build()?;
//! engine
//!     .add_document("handbook", "Vacation policy allows 15 days per year.", Metadata::new())
//!     .await?;
//!
//! let request = HybridSearchRequest::new("vacation policy").with_mode(SearchMode::DocumentsOnly);
//! let results = engine.search(&request).await?;
//! assert_eq!(results.total_results, 1);
//! # Ok::<(), hybrid_rag::error::RagError>(())
//! # }).unwrap();
//! ```

pub mod config;
pub mod engine;
pub mod types;

pub use config::HybridSearchConfig;
pub use engine::{HybridSearchEngine, HybridSearchEngineBuilder};
pub use types::{HybridSearchRequest, HybridSearchResults, SearchMode, SearchStage};
