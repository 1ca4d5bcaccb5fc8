mod bootstrap_helpers;
mod startup;
mod terminal_display;

use anyhow::Result;
use axis_cli::Cli;
use clap::Parser;

use crate::bootstrap_helpers::init_tracing;
use crate::startup::run_assistant;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run_assistant(cli).await
}
