//! Live web search as an optional extra retrieval source.
//!
//! A [`WebSearchProvider`] returns titled links with snippets; the
//! [`WebSearcher`] scores each hit for credibility and query relevance,
//! fetches page text for credible hits through a [`PageFetcher`], and turns
//! the hits into web [`Candidate`](crate::retrieval::Candidate)s.

pub mod fetcher;
pub mod provider;
pub mod scoring;
pub mod searcher;

pub use fetcher::{HtmlCleaner, HttpPageFetcher, PageFetcher};
pub use provider::{BingProvider, SerperProvider, WebHit, WebSearchProvider};
pub use scoring::{credibility_score, relevance_score};
pub use searcher::{WebSearchConfig, WebSearcher};
