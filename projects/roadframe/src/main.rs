mod cli;
mod commands;
mod control;
mod error;
mod extraction;
mod redaction;
mod run_artifacts;
mod run_context;
mod track;
mod video;
mod web;

use anyhow::Result;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;
use web::server::run_server;

/// Runs a synchronous CLI job off the async runtime.
async fn blocking<F>(job: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(job).await?
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse_args();

    match cli.command {
        Command::ExtractGps(args) => blocking(move || commands::run_extract_gps(args)).await,
        Command::ExtractHistogram(args) => {
            blocking(move || commands::run_extract_histogram(args)).await
        }
        Command::Redact(args) => blocking(move || commands::run_redact(args)).await,
        Command::Annotate(args) => blocking(move || commands::run_annotate(args)).await,
        Command::Reblur(args) => blocking(move || commands::run_reblur(args)).await,
        Command::Serve(args) => run_server(args).await,
    }
}
