//! ResearchKit CLI: model-driven topic research from the terminal.
//!
//! Sends prompts through the retrying invocation engine, scores search
//! candidates for relevance, and scrapes the pages worth reading.

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
