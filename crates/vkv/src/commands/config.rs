//! Backend configuration commands

use anyhow::Result;
use clap::{Args, Subcommand};
use vkv_engine::{KvEngine, WriteConfigRequest};

use crate::output;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective backend configuration
    Get,

    /// Update the persisted backend configuration
    Set(SetArgs),
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Versions retained per key
    #[arg(long)]
    pub max_versions: Option<u32>,

    /// Require check-and-set on every write
    #[arg(long)]
    pub cas_required: Option<bool>,

    /// Seconds until versions expire, also the per-key maximum (0 disables)
    #[arg(long, allow_negative_numbers = true)]
    pub delete_version_after: Option<i64>,
}

pub async fn run(cmd: ConfigCommands, engine: &KvEngine) -> Result<()> {
    match cmd {
        ConfigCommands::Get => output::json(&engine.read_config().await?),
        ConfigCommands::Set(args) => {
            let req = WriteConfigRequest {
                max_versions: args.max_versions,
                cas_required: args.cas_required,
                delete_version_after: args.delete_version_after,
            };
            output::finish(engine.write_config(req).await?)?;
            output::success("Updated backend configuration");
            Ok(())
        }
    }
}
