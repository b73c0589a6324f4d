//! First-stage retrieval and score fusion.
//!
//! - [`DenseRetriever`] queries a vector index by embedding similarity.
//! - [`SparseRetriever`] queries a fitted TF-IDF index by lexical overlap.
//! - [`FusionCombiner`] merges independently produced ranked lists into one
//!   deduplicated list by weighted linear combination.
//!
//! Each retriever offers two entry points: `try_retrieve`, which reports why
//! a path could not be used, and `retrieve`, which logs that reason and
//! degrades to an empty list.

pub mod candidate;
pub mod dense;
pub mod fusion;
pub mod sparse;

pub use candidate::{Candidate, Metadata, RetrievalPath, SourceType};
pub use dense::{DenseRetriever, DenseRetrieverConfig};
pub use fusion::{FusionCombiner, IdentityKey, RankedList, ScoreChannel};
pub use sparse::SparseRetriever;
