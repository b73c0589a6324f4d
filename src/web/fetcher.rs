//! Page content fetching for credible web hits.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;

use crate::error::{RagError, Result};
use crate::util::truncate_chars;

/// Default cap on extracted page text.
pub const DEFAULT_MAX_PAGE_CHARS: usize = 5000;

/// Fetches the readable text of a web page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Elements whose text never reaches the extracted content.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Turns HTML into whitespace-collapsed plain text.
///
/// The document is parsed with `scraper`, so character references of every
/// kind are decoded by the parser rather than by hand.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlCleaner;

impl HtmlCleaner {
    pub fn new() -> Self {
        HtmlCleaner
    }

    /// Join the text nodes outside script, style and noscript subtrees and
    /// collapse runs of whitespace.
    pub fn clean(&self, html: &str) -> String {
        let document = Html::parse_document(html);

        let mut words: Vec<&str> = Vec::new();
        for node in document.root_element().descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let skipped = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|element| SKIPPED_ELEMENTS.contains(&element.name()))
            });
            if !skipped {
                words.extend(text.split_whitespace());
            }
        }
        words.join(" ")
    }
}

/// Fetches pages over HTTP(S) and extracts their text.
///
/// Only `200 OK` responses produce content.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    cleaner: HtmlCleaner,
    max_chars: usize,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("hybrid-rag/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(HttpPageFetcher {
            client,
            cleaner: HtmlCleaner::new(),
            max_chars: DEFAULT_MAX_PAGE_CHARS,
        })
    }

    /// Cap the extracted text at `max_chars` characters.
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(RagError::other(format!("fetching {url} returned {status}")));
        }
        let html = response.text().await?;
        let text = self.cleaner.clean(&html);
        Ok(truncate_chars(&text, self.max_chars).to_string())
    }
}
