//! Small helpers shared across the pipeline stages.

use std::future::Future;
use std::time::Duration;

use crate::error::{RagError, Result};

/// Run `future` under an independent time budget.
///
/// An elapsed budget becomes [`RagError::ExternalTimeout`] naming `operation`;
/// errors from the future itself pass through unchanged.
pub async fn with_timeout<T, F>(operation: &str, budget: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(budget, future).await {
        Ok(result) => result,
        Err(_) => Err(RagError::timeout(operation, budget)),
    }
}

/// Return at most the first `max_chars` characters of `text`.
///
/// Counts Unicode scalar values, never splitting a multi-byte character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Descending comparison for scores, treating NaN as the lowest value.
pub fn score_desc(a: f32, b: f32) -> std::cmp::Ordering {
    let a = if a.is_nan() { f32::NEG_INFINITY } else { a };
    let b = if b.is_nan() { f32::NEG_INFINITY } else { b };
    b.total_cmp(&a)
}
