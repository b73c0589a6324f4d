//! Text analysis for the sparse (lexical) retrieval path.
//!
//! Raw text flows through a [`Tokenizer`](tokenizer::Tokenizer) and a chain of
//! [`Filter`](token_filter::Filter)s, composed by an
//! [`Analyzer`](analyzer::Analyzer):
//!
//! ```text
//! Raw Text → Tokenizer → Filter 1 → ... → Filter N → Token Stream
//! ```
//!
//! # Examples
//!
//! ```
//! use hybrid_rag::analysis::analyzer::{Analyzer, StandardAnalyzer};
//!
//! let analyzer = StandardAnalyzer::new().unwrap();
//! let terms: Vec<String> = analyzer
//!     .analyze("The Vacation policy is generous")
//!     .unwrap()
//!     .map(|token| token.text)
//!     .collect();
//!
//! assert_eq!(terms, vec!["vacation", "policy", "generous"]);
//! ```

pub mod analyzer;
pub mod token;
pub mod token_filter;
pub mod tokenizer;
