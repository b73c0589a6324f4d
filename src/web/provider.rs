//! Web search API providers.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{RagError, Result};

/// One organic web search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Provider name, e.g. `serper`.
    pub search_engine: String,
    /// 1-based rank reported by the provider.
    pub position: u32,
}

/// A web search backend.
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    /// Up to `max_results` hits for `query`, in the provider's rank order.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>>;

    fn name(&self) -> &str;
}

const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";
const BING_ENDPOINT: &str = "https://api.bing.microsoft.com/v7.0/search";

/// Google results through the Serper API.
#[derive(Debug, Clone)]
pub struct SerperProvider {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl SerperProvider {
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        SerperProvider {
            client: Client::new(),
            api_key: api_key.into(),
            endpoint: SERPER_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    position: u32,
}

fn serper_hits(response: SerperResponse, max_results: usize) -> Vec<WebHit> {
    response
        .organic
        .into_iter()
        .take(max_results)
        .map(|r| WebHit {
            title: r.title,
            url: r.link,
            snippet: r.snippet,
            search_engine: "serper".to_string(),
            position: r.position,
        })
        .collect()
}

#[async_trait]
impl WebSearchProvider for SerperProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query, "num": max_results }))
            .send()
            .await?
            .error_for_status()?;
        let body: SerperResponse = response.json().await?;
        Ok(serper_hits(body, max_results))
    }

    fn name(&self) -> &str {
        "serper"
    }
}

/// Results from the Bing Web Search API.
#[derive(Debug, Clone)]
pub struct BingProvider {
    client: Client,
    api_key: String,
    endpoint: String,
    market: String,
}

impl BingProvider {
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        BingProvider {
            client: Client::new(),
            api_key: api_key.into(),
            endpoint: BING_ENDPOINT.to_string(),
            market: "en-US".to_string(),
        }
    }

    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_market<S: Into<String>>(mut self, market: S) -> Self {
        self.market = market.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct BingResponse {
    #[serde(rename = "webPages")]
    web_pages: Option<BingWebPages>,
}

#[derive(Debug, Deserialize)]
struct BingWebPages {
    #[serde(default)]
    value: Vec<BingPage>,
}

#[derive(Debug, Deserialize)]
struct BingPage {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    snippet: String,
}

fn bing_hits(response: BingResponse, max_results: usize) -> Vec<WebHit> {
    response
        .web_pages
        .map(|pages| pages.value)
        .unwrap_or_default()
        .into_iter()
        .take(max_results)
        .enumerate()
        .map(|(i, page)| WebHit {
            title: page.name,
            url: page.url,
            snippet: page.snippet,
            search_engine: "bing".to_string(),
            position: i as u32 + 1,
        })
        .collect()
}

#[async_trait]
impl WebSearchProvider for BingProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>> {
        let count = max_results.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .query(&[("q", query), ("count", count.as_str()), ("mkt", self.market.as_str())])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RagError::other(format!("bing search returned {status}")));
        }
        let body: BingResponse = response.json().await?;
        Ok(bing_hits(body, max_results))
    }

    fn name(&self) -> &str {
        "bing"
    }
}
