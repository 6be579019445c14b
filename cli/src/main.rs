//! # recall
//!
//! Ingest text files into a passage store and query it by meaning.
//!
//! Usage:
//!   recall ingest notes.txt --meta lang=en      # Chunk, embed and store a file
//!   recall query "where do penguins live"       # Most relevant passages
//!   recall ask "where do penguins live?"        # Answer grounded in passages
//!   recall stats                                # Store summary

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use recall_passages::{Metadata, MetadataValue};
use recall_retrieval::{AnswerComposer, RetrievalConfig, RetrievalEngine, SimilarityResult};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Configuration file picked up from the working directory when `--config`
/// is not given.
const DEFAULT_CONFIG_FILE: &str = "recall.toml";

#[derive(Parser, Debug)]
#[command(name = "recall", version, about = "Semantic passage retrieval over a JSON store")]
struct Cli {
    /// TOML configuration file [default: recall.toml if present]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Record store path, overriding the configuration
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chunk a text file, embed its passages and append them to the store
    Ingest {
        /// File to ingest
        file: PathBuf,

        /// Source tag stored with every passage [default: the file path]
        #[arg(long)]
        source: Option<String>,

        /// Metadata attached to every passage, as key=value
        #[arg(long = "meta", value_parser = parse_meta)]
        meta: Vec<(String, MetadataValue)>,
    },

    /// Print the passages most relevant to a query
    Query {
        /// Query text
        text: String,

        /// Similarity a passage must exceed
        #[arg(long)]
        threshold: Option<f32>,

        /// Maximum number of passages
        #[arg(long)]
        top_k: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Answer a question from the stored passages
    Ask {
        /// Question text
        question: String,

        /// Print the answer and its passages as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print store statistics
    Stats {
        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_deref(), cli.store).await?;
    debug!("Using record store {}", config.store_path.display());

    let engine = RetrievalEngine::from_config(&config)
        .await
        .context("failed to set up retrieval engine")?;

    match cli.command {
        Command::Ingest { file, source, meta } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let source = source.unwrap_or_else(|| file.display().to_string());
            let metadata = (!meta.is_empty()).then(|| meta.into_iter().collect::<Metadata>());

            let report = engine.ingest(&text, &source, metadata).await?;
            println!("Stored {} passages from {}", report.chunks, report.source);
        }
        Command::Query {
            text,
            threshold,
            top_k,
            json,
        } => {
            let defaults = engine.query_defaults();
            let results = engine
                .find_relevant_with(
                    &text,
                    threshold.unwrap_or(defaults.threshold),
                    top_k.unwrap_or(defaults.top_k),
                )
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("No relevant passages found.");
            } else {
                for line in render_results(&results) {
                    println!("{line}");
                }
            }
        }
        Command::Ask { question, json } => {
            let composer = AnswerComposer::from_config(&config.generation);
            let answer = composer.answer(&engine, &question).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                println!("{}", answer.text);
                if !answer.passages.is_empty() {
                    println!("\nSources:");
                    for line in render_results(&answer.passages) {
                        println!("{line}");
                    }
                }
            }
        }
        Command::Stats { json } => {
            let stats = engine.stats().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Store:      {}", config.store_path.display());
                println!("Passages:   {}", stats.records);
                println!("Sources:    {}", stats.sources);
                match stats.dimension {
                    Some(dimension) => println!("Dimension:  {dimension}"),
                    None => println!("Dimension:  -"),
                }
            }
        }
    }

    Ok(())
}

/// Resolve configuration from an explicit file, `recall.toml` in the working
/// directory, or the defaults, in that order.
async fn load_config(path: Option<&Path>, store: Option<PathBuf>) -> Result<RetrievalConfig> {
    let mut config = match path {
        Some(path) => RetrievalConfig::load(path).await?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            info!("Loading configuration from {DEFAULT_CONFIG_FILE}");
            RetrievalConfig::load(DEFAULT_CONFIG_FILE).await?
        }
        None => RetrievalConfig::default(),
    };

    if let Some(store) = store {
        config.store_path = store;
    }

    Ok(config)
}

/// Parse a `key=value` metadata argument.
fn parse_meta(raw: &str) -> std::result::Result<(String, MetadataValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("metadata key is empty in `{raw}`"));
    }
    Ok((key.to_string(), MetadataValue::parse_scalar(value.trim())))
}

fn render_results(results: &[SimilarityResult]) -> Vec<String> {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{:>2}. {:.3}  [{}]  {}", i + 1, r.similarity, r.source, r.content))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_meta() {
        assert_eq!(
            parse_meta("lang=en").unwrap(),
            ("lang".to_string(), MetadataValue::Text("en".to_string()))
        );
        assert_eq!(
            parse_meta("page = 12").unwrap(),
            ("page".to_string(), MetadataValue::Integer(12))
        );
        assert_eq!(
            parse_meta("draft=true").unwrap(),
            ("draft".to_string(), MetadataValue::Bool(true))
        );
        assert!(parse_meta("no-equals").is_err());
        assert!(parse_meta("=value").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "recall", "ingest", "notes.txt", "--meta", "lang=en", "--meta", "page=3", "--store",
            "s.json",
        ])
        .unwrap();
        assert_eq!(cli.store, Some(PathBuf::from("s.json")));
        match cli.command {
            Command::Ingest { file, source, meta } => {
                assert_eq!(file, PathBuf::from("notes.txt"));
                assert_eq!(source, None);
                assert_eq!(meta.len(), 2);
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::try_parse_from(["recall", "query", "penguins", "--top-k", "2", "--json"])
            .unwrap();
        match cli.command {
            Command::Query {
                text,
                threshold,
                top_k,
                json,
            } => {
                assert_eq!(text, "penguins");
                assert_eq!(threshold, None);
                assert_eq!(top_k, Some(2));
                assert!(json);
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Cli::try_parse_from(["recall", "ingest", "f", "--meta", "bad"]).is_err());
    }

    #[test]
    fn test_render_results() {
        let results = vec![SimilarityResult {
            content: "Penguins live in the south".to_string(),
            similarity: 0.91234,
            source: "birds.txt".to_string(),
            metadata: None,
        }];

        assert_eq!(
            render_results(&results),
            vec![" 1. 0.912  [birds.txt]  Penguins live in the south".to_string()]
        );
    }

    #[tokio::test]
    async fn test_store_flag_overrides_default() {
        let config = load_config(None, Some(PathBuf::from("elsewhere.json")))
            .await
            .unwrap();
        assert_eq!(config.store_path, PathBuf::from("elsewhere.json"));
    }
}
