//! docgraph CLI: collect supply-chain documents and build a graph from them.
//!
//! Walks a folder of SBOMs (SPDX, CycloneDX), extracts packages, artifacts,
//! vulnerabilities and their relationships, and writes them to a graph store.

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
