//! `relgraph`: runs the document-management walkthrough against the
//! embedded authorization service and prints the answers.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use relgraph_server::observability::{init_logging, LoggingConfig};
use relgraph_server::scenario::{run_scenario, DOCUMENT_MODEL, STORE_NAME};
use relgraph_server::{AuthzService, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "relgraph", version, about = "Relationship-based authorization walkthrough")]
struct Args {
    /// YAML configuration file; RELGRAPH_* variables override it
    #[arg(long, env = "RELGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Authorization model JSON to publish instead of the built-in one
    #[arg(long)]
    model: Option<PathBuf>,

    /// Name of the store to create
    #[arg(long, default_value = STORE_NAME)]
    store_name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ServerConfig::from_env().context("loading configuration")?,
    };
    init_logging(LoggingConfig::from(&config.logging));

    let model_json = match &args.model {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading model from {}", path.display()))?,
        None => DOCUMENT_MODEL.to_string(),
    };

    let service = AuthzService::in_memory(config);
    let report = run_scenario(&service, &args.store_name, &model_json).await?;
    info!(
        store_id = %report.store_id,
        authorization_model_id = %report.authorization_model_id,
        "walkthrough finished"
    );

    println!("{report}");
    Ok(())
}
