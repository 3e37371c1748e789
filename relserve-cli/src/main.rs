//! Relserve CLI - Command-line interface
//!
//! Runs the release server and inspects the release catalog.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use relserve_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "relserve")]
#[command(about = "Installer release distribution server")]
struct Cli {
    /// Console log level
    #[arg(long, global = true, default_value = "info")]
    log_level: CliLogLevel,

    /// Also write a full trace log of this run to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), cli.log_dir.as_deref())?;

    commands::handle_command(cli.command).await
}
