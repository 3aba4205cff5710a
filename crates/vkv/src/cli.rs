//! CLI argument parsing with clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub use crate::commands::config::ConfigCommands;
pub use crate::commands::kv::KvCommands;
pub use crate::commands::metadata::MetadataCommands;

/// vkv - versioned, encrypted key-value store
#[derive(Parser, Debug)]
#[command(name = "vkv")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress log output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Storage directory (defaults to the platform data directory)
    #[arg(long, env = "VKV_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Open storage read-only; every write fails
    #[arg(long, global = true)]
    pub read_only: bool,

    /// YAML file with backend configuration defaults
    #[arg(short, long, env = "VKV_CONFIG", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Key metadata management
    #[command(subcommand)]
    Metadata(MetadataCommands),

    /// Versioned secret data
    #[command(subcommand)]
    Kv(KvCommands),

    /// Backend configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}
