//! cyto-pipeline - load, analyze and report
//!
//! 1. Open the Schema Store and create the schema if needed
//! 2. Replace-load the cell count CSV
//! 3. Run every analysis and write the output artifacts

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cyto_common::config::AppConfig;
use cyto_common::{CytometryStore, PopulationVocabulary};
use cyto_pipeline::{Analyzer, Loader, OutputWriter};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for cyto-pipeline
#[derive(Parser, Debug)]
#[command(name = "cyto-pipeline")]
#[command(about = "Cytometry cell count loader and analysis pipeline")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "CYTO_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long, env = "CYTO_DATABASE")]
    database: Option<PathBuf>,

    /// Input cell count CSV
    #[arg(short, long, env = "CYTO_INPUT")]
    input: Option<PathBuf>,

    /// Directory for the output artifacts
    #[arg(short, long, env = "CYTO_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(input) = args.input {
        config.input_path = input;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }

    // RUST_LOG takes precedence over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cyto-pipeline v{}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", config.database_path.display());
    info!("Input: {}", config.input_path.display());

    // Step 1: Schema Store
    let store = CytometryStore::open(&config.database_path, PopulationVocabulary::default())
        .await
        .context("Failed to open database")?;
    store
        .initialize()
        .await
        .context("Failed to initialize schema")?;

    // Step 2: Replace-load
    Loader::new(&store)
        .load(&config.input_path)
        .await
        .with_context(|| format!("Failed to load {}", config.input_path.display()))?;

    let summary = store.summary().await.context("Failed to summarize store")?;
    info!("Data summary:");
    info!("  Projects: {}", summary.num_projects);
    info!("  Subjects: {}", summary.num_subjects);
    info!("  Samples: {}", summary.num_samples);
    info!("  Conditions: {}", summary.num_conditions);
    info!("  Treatments: {}", summary.num_treatments);

    // Step 3: Analysis and outputs
    let report = Analyzer::new(&store, &config.analysis)
        .run()
        .await
        .context("Analysis failed")?;

    let written = OutputWriter::new(&config.output_dir)
        .write_all(&report)
        .context("Failed to write outputs")?;
    for path in &written {
        info!("  {}", path.display());
    }

    store.close().await;
    info!("Pipeline complete");
    Ok(())
}
