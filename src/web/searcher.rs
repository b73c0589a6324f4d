//! Web search pipeline: search, score, fetch, convert to candidates.

use std::sync::Arc;
use std::time::Duration;

use chrono::Datelike;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::retrieval::candidate::{Candidate, RetrievalPath};
use crate::util::{score_desc, truncate_chars, with_timeout};
use crate::web::fetcher::{DEFAULT_MAX_PAGE_CHARS, PageFetcher};
use crate::web::provider::{WebHit, WebSearchProvider};
use crate::web::scoring::{credibility_score, relevance_score};

/// Settings for the web search pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchConfig {
    /// Budget for the provider call.
    pub search_timeout: Duration,
    /// Budget for each page fetch.
    pub fetch_timeout: Duration,
    /// Page content is fetched only for hits scoring strictly above this.
    pub credibility_threshold: f32,
    /// Cap on fetched page text, in characters.
    pub max_page_chars: usize,
    /// Fetch page content at all.
    pub fetch_content: bool,
    /// Weight of credibility in the heuristic web ordering.
    pub credibility_weight: f32,
    /// Weight of relevance in the heuristic web ordering.
    pub relevance_weight: f32,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        WebSearchConfig {
            search_timeout: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(10),
            credibility_threshold: 0.6,
            max_page_chars: DEFAULT_MAX_PAGE_CHARS,
            fetch_content: true,
            credibility_weight: 0.4,
            relevance_weight: 0.6,
        }
    }
}

impl WebSearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.search_timeout.is_zero() || self.fetch_timeout.is_zero() {
            return Err(RagError::invalid_config("web timeouts must be non-zero"));
        }
        for (name, value) in [
            ("credibility_threshold", self.credibility_threshold),
            ("credibility_weight", self.credibility_weight),
            ("relevance_weight", self.relevance_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RagError::invalid_config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// A hit with its heuristic scores, before conversion to a candidate.
#[derive(Debug, Clone)]
struct ScoredHit {
    hit: WebHit,
    credibility: f32,
    relevance: f32,
}

/// Runs a web search and turns the hits into web candidates.
///
/// Each candidate carries its query relevance as `sparse_score`, and
/// `url`, `title`, `search_engine`, `credibility_score` and
/// `relevance_score` metadata. Content is the fetched page text when a
/// fetch was attempted and succeeded, otherwise the snippet.
#[derive(Clone)]
pub struct WebSearcher {
    provider: Arc<dyn WebSearchProvider>,
    fetcher: Option<Arc<dyn PageFetcher>>,
    config: WebSearchConfig,
}

impl std::fmt::Debug for WebSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSearcher")
            .field("provider", &self.provider.name())
            .field("fetcher", &self.fetcher.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl WebSearcher {
    pub fn new(provider: Arc<dyn WebSearchProvider>) -> Self {
        WebSearcher {
            provider,
            fetcher: None,
            config: WebSearchConfig::default(),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_config(mut self, config: WebSearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &WebSearchConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Search, score and convert hits, or report why the provider failed.
    ///
    /// Page fetch failures never fail the search; the hit keeps its snippet.
    pub async fn try_search(&self, query: &str, max_results: usize) -> Result<Vec<Candidate>> {
        if max_results == 0 {
            return Ok(Vec::new());
        }
        let hits = with_timeout(
            "web search",
            self.config.search_timeout,
            self.provider.search(query, max_results),
        )
        .await
        .map_err(|e| e.into_unavailable(RetrievalPath::Web))?;

        let year = chrono::Utc::now().year();
        let scored: Vec<ScoredHit> = hits
            .into_iter()
            .take(max_results)
            .map(|hit| ScoredHit {
                credibility: credibility_score(&hit.url, &hit.title, &hit.snippet, year),
                relevance: relevance_score(query, &hit.title, &hit.snippet),
                hit,
            })
            .collect();

        let contents = join_all(scored.iter().map(|s| self.fetch_if_credible(s))).await;

        let mut ranked: Vec<(f32, Candidate)> = scored
            .into_iter()
            .zip(contents)
            .map(|(scored, content)| {
                let heuristic = scored.credibility * self.config.credibility_weight
                    + scored.relevance * self.config.relevance_weight;
                (heuristic, to_candidate(scored, content))
            })
            .collect();
        ranked.sort_by(|a, b| score_desc(a.0, b.0));

        log::debug!(
            "web search via {} returned {} results",
            self.provider.name(),
            ranked.len()
        );
        Ok(ranked.into_iter().map(|(_, candidate)| candidate).collect())
    }

    /// Like [`try_search`](Self::try_search), but a failure is logged and
    /// degrades to an empty list.
    pub async fn search(&self, query: &str, max_results: usize) -> Vec<Candidate> {
        match self.try_search(query, max_results).await {
            Ok(candidates) => candidates,
            Err(e) => {
                log::warn!("web search degraded to no results: {e}");
                Vec::new()
            }
        }
    }

    async fn fetch_if_credible(&self, scored: &ScoredHit) -> Option<String> {
        let fetcher = self.fetcher.as_ref()?;
        if !self.config.fetch_content || scored.credibility <= self.config.credibility_threshold {
            return None;
        }
        let url = scored.hit.url.as_str();
        match with_timeout("page fetch", self.config.fetch_timeout, fetcher.fetch(url)).await {
            Ok(text) if !text.trim().is_empty() => {
                Some(truncate_chars(&text, self.config.max_page_chars).to_string())
            }
            Ok(_) => None,
            Err(e) => {
                log::warn!("keeping snippet for {url}: {e}");
                None
            }
        }
    }
}

fn to_candidate(scored: ScoredHit, content: Option<String>) -> Candidate {
    let ScoredHit {
        hit,
        credibility,
        relevance,
    } = scored;
    let fetched = content.is_some();
    let content = match content {
        Some(text) => text,
        None if !hit.snippet.trim().is_empty() => hit.snippet,
        None => hit.title.clone(),
    };
    Candidate::web(content)
        .with_sparse_score(relevance)
        .with_metadata_entry("url", hit.url)
        .with_metadata_entry("title", hit.title)
        .with_metadata_entry("search_engine", hit.search_engine)
        .with_metadata_entry("position", hit.position)
        .with_metadata_entry("credibility_score", credibility)
        .with_metadata_entry("relevance_score", relevance)
        .with_metadata_entry("content_fetched", fetched)
}
