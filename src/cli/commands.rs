//! Command implementations for the hybrid-rag CLI.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::context::ContextBuilder;
use crate::embedding::OpenAiTextEmbedder;
use crate::error::{RagError, Result};
use crate::hybrid::{
    HybridSearchConfig, HybridSearchEngine, HybridSearchRequest, HybridSearchResults, SearchMode,
};
use crate::rerank::HttpCrossEncoder;
use crate::retrieval::Metadata;
use crate::web::{HttpPageFetcher, SerperProvider};

/// One document read from a JSONL corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusDocument {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// Execute a CLI command.
pub async fn execute_command(args: RagArgs) -> Result<()> {
    match &args.command {
        Command::Search(search_args) => search(search_args, &args).await,
        Command::Context(search_args) => context(search_args, &args).await,
        Command::Config(config_args) => show_config(config_args, &args),
    }
}

async fn search(search_args: &SearchArgs, cli_args: &RagArgs) -> Result<()> {
    let results = run_search(search_args, cli_args).await?;
    output_search_results(&results, cli_args)
}

async fn context(search_args: &SearchArgs, cli_args: &RagArgs) -> Result<()> {
    let results = run_search(search_args, cli_args).await?;
    let block = ContextBuilder::new().format(&results.results);
    output_text("context", &block, cli_args)
}

fn show_config(config_args: &ConfigArgs, cli_args: &RagArgs) -> Result<()> {
    let config = match &config_args.file {
        Some(path) => HybridSearchConfig::from_file(path)?,
        None => HybridSearchConfig::default(),
    };
    match cli_args.output_format {
        OutputFormat::Human => {
            println!("{}", config.to_json_pretty()?);
            Ok(())
        }
        OutputFormat::Json => output_result("Configuration", &config, cli_args),
    }
}

async fn run_search(search_args: &SearchArgs, cli_args: &RagArgs) -> Result<HybridSearchResults> {
    let engine = build_engine(search_args)?;

    if let Some(corpus) = &search_args.corpus {
        let start = Instant::now();
        let documents = load_corpus(corpus)?;
        let document_count = documents.len();
        engine
            .add_documents(
                documents
                    .into_iter()
                    .map(|document| (document.id, document.text, document.metadata)),
            )
            .await?;
        if cli_args.verbosity() > 1 {
            eprintln!(
                "Indexed {document_count} documents ({} chunks) in {:.1}ms",
                engine.chunk_count(),
                start.elapsed().as_secs_f64() * 1000.0
            );
        }
    } else if search_args.mode != ModeArg::Web {
        log::warn!("no corpus given; only web results can be returned");
    }

    let mut request = HybridSearchRequest::new(search_args.query.clone())
        .with_mode(SearchMode::from(search_args.mode))
        .with_include_web(!search_args.no_web);
    if let Some(limit) = search_args.limit {
        request = request.with_max_results(limit);
    }
    if search_args.dense_weight.is_some() || search_args.sparse_weight.is_some() {
        let config = engine.config();
        request = request.with_weights(
            search_args.dense_weight.unwrap_or(config.dense_weight),
            search_args.sparse_weight.unwrap_or(config.sparse_weight),
        );
    }

    engine.search(&request).await
}

fn build_engine(search_args: &SearchArgs) -> Result<HybridSearchEngine> {
    let config = match &search_args.config {
        Some(path) => HybridSearchConfig::from_file(path)?,
        None => HybridSearchConfig::default(),
    };
    let mut builder = HybridSearchEngine::builder().config(config);

    if let Some(model) = &search_args.openai_model {
        let api_key = search_args.api_key.clone().ok_or_else(|| {
            RagError::invalid_config("--openai-model requires --api-key or OPENAI_API_KEY")
        })?;
        builder = builder.embedder(Arc::new(OpenAiTextEmbedder::new(api_key, model.clone())?));
    }
    if let Some(url) = &search_args.rerank_url {
        builder = builder.cross_encoder(Arc::new(HttpCrossEncoder::new(url.clone())));
    }
    if let Some(serper_key) = &search_args.serper_key {
        builder = builder
            .web_provider(Arc::new(SerperProvider::new(serper_key.clone())))
            .page_fetcher(Arc::new(HttpPageFetcher::new()?));
    }

    builder.build()
}

/// Read a JSONL corpus.
///
/// Each non-blank line is an object with a `text` field, an optional `id`
/// (a random UUID is assigned when missing) and any other fields, which
/// become document metadata.
pub fn load_corpus<P: AsRef<Path>>(path: P) -> Result<Vec<CorpusDocument>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut documents = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        documents.push(parse_corpus_line(&line).map_err(|e| {
            RagError::invalid_argument(format!("corpus line {}: {e}", line_num + 1))
        })?);
    }

    Ok(documents)
}

fn parse_corpus_line(line: &str) -> Result<CorpusDocument> {
    let Value::Object(mut fields) = serde_json::from_str::<Value>(line)? else {
        return Err(RagError::invalid_argument("expected a JSON object"));
    };

    let text = match fields.remove("text") {
        Some(Value::String(text)) => text,
        _ => return Err(RagError::invalid_argument("missing string field \"text\"")),
    };
    let id = match fields.remove("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => id,
        Some(Value::Number(n)) => n.to_string(),
        _ => uuid::Uuid::new_v4().to_string(),
    };

    Ok(CorpusDocument {
        id,
        text,
        metadata: fields.into_iter().collect(),
    })
}
