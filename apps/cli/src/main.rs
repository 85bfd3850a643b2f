//! QnaSync CLI: knowledge-base management and event replay.
//!
//! Talks to the remote knowledge-base service directly, and replays content
//! lifecycle events from a local libSQL repository through the
//! reconciliation engine.

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
