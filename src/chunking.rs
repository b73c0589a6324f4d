//! Splitting documents into overlapping chunks for indexing.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{RagError, Result};

/// Chunk sizing, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk length.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub overlap: usize,
    /// How far back from the chunk end to look for a sentence boundary.
    pub boundary_lookback: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        ChunkingConfig {
            chunk_size: 1000,
            overlap: 200,
            boundary_lookback: 100,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::invalid_config("chunk_size must be at least 1"));
        }
        if self.overlap >= self.chunk_size {
            return Err(RagError::invalid_config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Splits text into overlapping, whitespace-trimmed chunks.
///
/// A chunk ends at a `.`, `!` or `?` found within the last
/// `boundary_lookback` characters of its window when there is one. Text no
/// longer than `chunk_size` is returned as a single chunk.
#[derive(Debug, Clone, Default)]
pub struct TextChunker {
    config: ChunkingConfig,
}

impl TextChunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(TextChunker { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let ChunkingConfig {
            chunk_size,
            overlap,
            boundary_lookback,
        } = self.config;

        if len <= chunk_size {
            let trimmed = text.trim();
            return if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_string()]
            };
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let mut end = (start + chunk_size).min(len);
            if end < len {
                let floor = end.saturating_sub(boundary_lookback).max(start);
                if let Some(pos) = (floor + 1..=end).rev().find(|&i| matches!(chars[i], '.' | '!' | '?')) {
                    end = pos + 1;
                }
            }

            let chunk: String = chars[start..end].iter().collect();
            let chunk = chunk.trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }

            if end >= len {
                break;
            }
            // always advance, even when a boundary pulled `end` close to `start`
            start = end.saturating_sub(overlap).max(start + 1);
        }
        chunks
    }
}

/// Number of words in `text`, by Unicode word boundaries.
pub fn word_count(text: &str) -> usize {
    text.unicode_words().count()
}
