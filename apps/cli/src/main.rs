//! SheetLoad CLI: schema-driven spreadsheet ingestion.
//!
//! Runs ingestion jobs from the command line or behind an HTTP entrypoint,
//! and inspects jobs, schemas and loaded tables.

mod commands;
mod server;

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
