//! Command line argument parsing for the hybrid-rag CLI using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::hybrid::SearchMode;

/// hybrid-rag - dense + sparse retrieval with re-ranking over a JSONL corpus
#[derive(Parser, Debug, Clone)]
#[command(name = "hybrid-rag")]
#[command(about = "Hybrid dense + sparse retrieval for retrieval-augmented generation")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct RagArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl RagArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Search a corpus and print the ranked results
    Search(SearchArgs),

    /// Search a corpus and print the citation-annotated context block
    Context(SearchArgs),

    /// Print the effective configuration as JSON
    Config(ConfigArgs),
}

/// Arguments shared by `search` and `context`
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Query string
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// JSONL corpus, one `{"id", "text", ...metadata}` object per line
    #[arg(short, long, value_name = "CORPUS_FILE")]
    pub corpus: Option<PathBuf>,

    /// Search configuration file (JSON)
    #[arg(long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Maximum number of results to return
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Search mode
    #[arg(short = 'm', long, default_value = "hybrid")]
    pub mode: ModeArg,

    /// Weight of the dense path in document fusion
    #[arg(long)]
    pub dense_weight: Option<f32>,

    /// Weight of the sparse path in document fusion
    #[arg(long)]
    pub sparse_weight: Option<f32>,

    /// Skip web search in hybrid mode
    #[arg(long)]
    pub no_web: bool,

    /// OpenAI embedding model; uses the offline hashing embedder when unset
    #[arg(long, value_name = "MODEL")]
    pub openai_model: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Serper API key, enables web search
    #[arg(long, env = "SERPER_API_KEY", hide_env_values = true)]
    pub serper_key: Option<String>,

    /// Base URL of a text-embeddings-inference style re-rank service
    #[arg(long, value_name = "URL")]
    pub rerank_url: Option<String>,
}

/// Arguments for printing configuration
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Load and validate this file instead of printing the defaults
    #[arg(value_name = "CONFIG_FILE")]
    pub file: Option<PathBuf>,
}

/// Search modes available in CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeArg {
    /// Documents and web, fused
    Hybrid,
    /// Ingested documents only
    Documents,
    /// Web search only
    Web,
}

impl From<ModeArg> for SearchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Hybrid => SearchMode::Hybrid,
            ModeArg::Documents => SearchMode::DocumentsOnly,
            ModeArg::Web => SearchMode::WebOnly,
        }
    }
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_basic_search_command() {
        let args = RagArgs::try_parse_from([
            "hybrid-rag",
            "search",
            "vacation policy",
            "--corpus",
            "docs.jsonl",
            "--limit",
            "5",
            "--mode",
            "documents",
        ])
        .unwrap();

        if let Command::Search(search_args) = args.command {
            assert_eq!(search_args.query, "vacation policy");
            assert_eq!(search_args.corpus, Some(PathBuf::from("docs.jsonl")));
            assert_eq!(search_args.limit, Some(5));
            assert_eq!(SearchMode::from(search_args.mode), SearchMode::DocumentsOnly);
            assert!(!search_args.no_web);
        } else {
            panic!("Expected Search command");
        }
    }

    #[test]
    fn test_context_command_with_weights() {
        let args = RagArgs::try_parse_from([
            "hybrid-rag",
            "context",
            "benefits",
            "--dense-weight",
            "0.5",
            "--sparse-weight",
            "0.5",
            "--no-web",
        ])
        .unwrap();

        if let Command::Context(search_args) = args.command {
            assert_eq!(search_args.dense_weight, Some(0.5));
            assert_eq!(search_args.sparse_weight, Some(0.5));
            assert!(search_args.no_web);
            assert_eq!(search_args.mode, ModeArg::Hybrid);
        } else {
            panic!("Expected Context command");
        }
    }

    #[test]
    fn test_verbosity_levels() {
        let args = RagArgs::try_parse_from(["hybrid-rag", "config"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args = RagArgs::try_parse_from(["hybrid-rag", "-vv", "config"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        let args = RagArgs::try_parse_from(["hybrid-rag", "config", "--quiet"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_output_format() {
        let args =
            RagArgs::try_parse_from(["hybrid-rag", "--format", "json", "--pretty", "config"])
                .unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
        assert!(args.pretty);
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let result = RagArgs::try_parse_from(["hybrid-rag", "search", "q", "--mode", "vector"]);
        assert!(result.is_err());
    }
}
