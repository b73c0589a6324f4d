//! Second-stage re-ranking with a pairwise relevance model.
//!
//! Retrieval is cheap and broad; the [`CrossEncoder`] is precise but too
//! expensive for the whole corpus, so it only scores the fused candidates.
//! [`Reranker`] blends its scores with the fusion scores and never fails the
//! query: a model error or timeout falls back to the fusion ordering.

pub mod cross_encoder;
pub mod reranker;

pub use cross_encoder::{CrossEncoder, HttpCrossEncoder};
pub use reranker::{RerankConfig, Reranker};
