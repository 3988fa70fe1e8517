//! pdf-annotate
//!
//! Runs the annotation engine on one PDF against a local Ollama server and
//! prints the outcome as JSON.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdf_annotator::{AnnotationEngine, Config, Rule};

#[derive(Parser, Debug)]
#[command(name = "pdf-annotate", version, about = "Highlight rule evidence in a PDF")]
struct Cli {
    /// PDF file to annotate
    pdf: PathBuf,

    /// JSON file with an array of {"id", "definition"} rules
    rules: PathBuf,

    /// Tokens per chunk window
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Tokens shared between adjacent windows
    #[arg(long)]
    overlap: Option<usize>,

    /// Ollama model for matching
    #[arg(long)]
    model: Option<String>,

    /// Only check that the oracle is reachable and has the model
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the JSON result
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "pdf_annotator=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(chunk_size) = cli.chunk_size {
        config.engine.chunk_size = chunk_size;
    }
    if let Some(overlap) = cli.overlap {
        config.engine.overlap = overlap;
    }
    if let Some(model) = cli.model {
        config.oracle.model = model;
    }

    let engine = AnnotationEngine::from_config(&config)?;

    if cli.check {
        if engine.is_oracle_available().await {
            tracing::info!(model = %config.oracle.model, "Oracle is available");
            return Ok(());
        }
        anyhow::bail!(
            "model '{}' is not available at {}",
            config.oracle.model,
            config.oracle.base_url
        );
    }

    let pdf = tokio::fs::read(&cli.pdf)
        .await
        .with_context(|| format!("reading {}", cli.pdf.display()))?;
    let rules_json = tokio::fs::read_to_string(&cli.rules)
        .await
        .with_context(|| format!("reading {}", cli.rules.display()))?;
    let rules: Vec<Rule> = serde_json::from_str(&rules_json).context("parsing rules")?;

    let outcome = engine.annotate(&pdf, &rules).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}
