mod cli;
mod config;
mod diagram;
mod error;
mod output;
mod report;
mod workflows;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting wfgraph - Workflow Diagram Generator");
    cli.execute()?;

    Ok(())
}
