//! geofill CLI, batch geocoding enrichment for license records.
//!
//! Reads a CSV export, resolves unset locations through a rate-limited
//! geocoding provider, and writes a resumable JSON results file.

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
