//! Lexical (TF-IDF) index used by the sparse retriever.
//!
//! A [`TfIdfVectorizer`] is fitted once over a corpus; the vectorizer, the
//! resulting row vectors and the corpus entries are frozen together in a
//! [`FittedIndex`]. Refitting always builds a new `FittedIndex`.

pub mod fitted;
pub mod vectorizer;

pub use fitted::{CorpusEntry, FittedIndex};
pub use vectorizer::{SparseIndexConfig, SparseVector, TfIdfVectorizer};
