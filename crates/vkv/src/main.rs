//! vkv CLI - versioned, encrypted key-value store
//!
//! This is the main entry point for the vkv command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let engine = commands::open_engine(&cli.global).await?;

    match cli.command {
        Commands::Metadata(cmd) => commands::metadata::run(cmd, &engine).await,
        Commands::Kv(cmd) => commands::kv::run(cmd, &engine).await,
        Commands::Config(cmd) => commands::config::run(cmd, &engine).await,
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            // Keep stdout clean for JSON output unless asked
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
