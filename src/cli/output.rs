//! Output formatting for CLI commands.

use serde::Serialize;

use crate::cli::args::{OutputFormat, RagArgs};
use crate::error::Result;
use crate::hybrid::HybridSearchResults;
use crate::util::truncate_chars;

/// Characters of content shown per result in human output.
const PREVIEW_CHARS: usize = 200;

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &RagArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            if args.verbosity() > 0 {
                println!("{message}");
                println!();
            }
            let value = serde_json::to_value(result)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output search results, with a ranked listing in human format.
pub fn output_search_results(results: &HybridSearchResults, args: &RagArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            print!("{}", render_search_results(results));
            Ok(())
        }
        OutputFormat::Json => output_json(results, args),
    }
}

/// Output a plain text block; JSON output wraps it in an object.
pub fn output_text(key: &str, text: &str, args: &RagArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            println!("{text}");
            Ok(())
        }
        OutputFormat::Json => output_json(&serde_json::json!({ key: text }), args),
    }
}

fn output_json<T: Serialize>(result: &T, args: &RagArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{json}");
    Ok(())
}

/// Render search results as a human-readable listing.
pub fn render_search_results(results: &HybridSearchResults) -> String {
    let mut out = String::new();
    out.push_str(&format!("Search Results for \"{}\" ({})\n", results.query, results.mode));
    out.push_str("═══════════════\n");

    for (i, candidate) in results.results.iter().enumerate() {
        out.push('\n');
        out.push_str(&format!(
            "Result {}: (Score: {:.3}) [{}]\n",
            i + 1,
            candidate.ranking_score(),
            candidate.source_type
        ));
        out.push_str("─────────────\n");
        let title = candidate
            .metadata_str("title")
            .or_else(|| candidate.metadata_str("document_title"));
        if let Some(title) = title {
            out.push_str(&format!("Title: {title}\n"));
        }
        if let Some(url) = candidate.metadata_str("url") {
            out.push_str(&format!("URL: {url}\n"));
        }
        if let Some(chunk_id) = candidate.metadata_str("chunk_id") {
            out.push_str(&format!("Chunk: {chunk_id}\n"));
        }
        out.push_str(&format!(
            "dense={:.3} sparse={:.3} combined={:.3}",
            candidate.dense_score, candidate.sparse_score, candidate.combined_score
        ));
        if let Some(rerank) = candidate.rerank_score {
            out.push_str(&format!(" rerank={rerank:.3}"));
        }
        out.push('\n');

        let preview = truncate_chars(&candidate.content, PREVIEW_CHARS);
        out.push_str(preview);
        if preview.len() < candidate.content.len() {
            out.push_str("...");
        }
        out.push('\n');
    }

    out.push('\n');
    out.push_str(&format!(
        "Total results: {} ({} documents, {} web)\n",
        results.total_results, results.document_results, results.web_results
    ));
    out.push_str(&format!(
        "Search time: {:.1}ms\n",
        results.response_time * 1000.0
    ));
    out
}
