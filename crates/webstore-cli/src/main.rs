mod bootstrap;
mod cli_args;
mod serve;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use webstore_bridge::{StaticConsentPresenter, WebStoreMessageHandler};
use webstore_registry::ExtensionRegistry;

use crate::bootstrap::init_tracing;
use crate::cli_args::Cli;
use crate::serve::serve_ndjson;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    let registry = match cli.registry_path.as_ref() {
        Some(path) => ExtensionRegistry::open(path).with_context(|| {
            format!("failed to open extension registry {}", path.display())
        })?,
        None => ExtensionRegistry::in_memory(),
    };
    let presenter = StaticConsentPresenter::new(cli.consent.into());
    let handler = WebStoreMessageHandler::new(
        cli.bridge_config(),
        Arc::new(registry),
        Arc::new(presenter),
    )
    .context("failed to start web store bridge")?;
    tracing::info!(
        handler = handler.handler_name(),
        extensions = handler.registry().len(),
        consent = ?cli.consent,
        "web store bridge ready"
    );

    let report = serve_ndjson(
        Arc::new(handler),
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;
    tracing::info!(
        processed_lines = report.processed_lines,
        rejected = report.rejected_count,
        "web store bridge input closed"
    );
    Ok(())
}
