//! Text embedding collaborators for dense retrieval.
//!
//! The dense side of the pipeline only relies on the [`TextEmbedder`] trait.
//! The same embedder (same model identity) must be used when documents are
//! indexed and when queries are embedded; a mismatch degrades relevance
//! without any error.
//!
//! - [`OpenAiTextEmbedder`] calls an OpenAI-compatible embeddings API.
//! - [`HashingTextEmbedder`] is a deterministic feature-hashing embedder
//!   that needs no network access.

pub mod hashing;
pub mod openai;
pub mod text_embedder;

pub use hashing::HashingTextEmbedder;
pub use openai::OpenAiTextEmbedder;
pub use text_embedder::TextEmbedder;
