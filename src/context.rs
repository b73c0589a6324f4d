//! Rendering ranked candidates as a citation-annotated context block.
//!
//! The block is the hand-off to a generative model, which is outside this
//! crate. [`extract_citations`] checks a generated answer against the
//! sources it was given.

use serde::{Deserialize, Serialize};

use crate::retrieval::candidate::{Candidate, SourceType};
use crate::util::truncate_chars;

/// Text used when there is nothing to cite.
pub const NO_SOURCES: &str = "No sources available.";

/// Formats candidates as numbered `Source i:` blocks.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    max_content_chars: usize,
    separator_width: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        ContextBuilder {
            max_content_chars: 1000,
            separator_width: 50,
        }
    }
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap each source's content at `max_content_chars` characters.
    pub fn with_max_content_chars(mut self, max_content_chars: usize) -> Self {
        self.max_content_chars = max_content_chars;
        self
    }

    pub fn format(&self, results: &[Candidate]) -> String {
        if results.is_empty() {
            return NO_SOURCES.to_string();
        }
        let rule = "-".repeat(self.separator_width);
        results
            .iter()
            .enumerate()
            .map(|(i, candidate)| {
                let mut block = format!("Source {}:\n", i + 1);
                if let Some(title) = source_title(candidate) {
                    block.push_str(&format!("Title: {title}\n"));
                }
                if let Some(url) = candidate.metadata_str("url").filter(|u| !u.is_empty()) {
                    block.push_str(&format!("URL: {url}\n"));
                }
                block.push_str(&format!("Type: {}\n", candidate.source_type));
                if let Some(credibility) = credibility(candidate) {
                    block.push_str(&format!("Credibility: {credibility:.2}\n"));
                }
                let content = truncate_chars(&candidate.content, self.max_content_chars);
                let ellipsis = if content.len() < candidate.content.len() { "..." } else { "" };
                block.push_str(&format!("Content: {content}{ellipsis}\n{rule}"));
                block
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Whether a generated response refers to one of its sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based, matching `Source i:` in the context block.
    pub source_index: usize,
    pub title: String,
    pub url: String,
    pub source_type: SourceType,
    pub credibility_score: Option<f32>,
    pub mentioned_in_response: bool,
}

/// One citation per source; a source counts as mentioned when its title
/// appears in `response` (case-insensitive) or its URL appears verbatim.
pub fn extract_citations(response: &str, sources: &[Candidate]) -> Vec<Citation> {
    let response_lower = response.to_lowercase();
    sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let title = source_title(source).unwrap_or_default().to_string();
            let url = source.metadata_str("url").unwrap_or_default().to_string();
            let mentioned = (!title.is_empty() && response_lower.contains(&title.to_lowercase()))
                || (!url.is_empty() && response.contains(&url));
            Citation {
                source_index: i + 1,
                title,
                url,
                source_type: source.source_type,
                credibility_score: credibility(source),
                mentioned_in_response: mentioned,
            }
        })
        .collect()
}

fn source_title(candidate: &Candidate) -> Option<&str> {
    ["title", "document_title"]
        .iter()
        .find_map(|key| candidate.metadata_str(key))
        .filter(|title| !title.is_empty())
}

fn credibility(candidate: &Candidate) -> Option<f32> {
    candidate
        .metadata
        .get("credibility_score")
        .and_then(|v| v.as_f64())
        .map(|v| v as f32)
}
