//! AgencyPulse CLI: context-grounded offer drafts, daily briefs and lead
//! scores for a digital agency.
//!
//! Serves the pipeline HTTP API, runs the pipelines from the terminal, and
//! manages the local record store and configuration.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
