//! Key metadata commands

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use serde_json::json;
use std::collections::BTreeMap;
use vkv_engine::{KvEngine, WriteMetadataRequest};

use super::parse_key_value;
use crate::output;

#[derive(Subcommand, Debug)]
pub enum MetadataCommands {
    /// Show the metadata of a key
    Get(PathArgs),

    /// Create or update the metadata of a key
    Put(PutArgs),

    /// List keys below a path
    List(ListArgs),

    /// Erase a key with every version
    Delete(PathArgs),

    /// Check whether a key exists
    Exists(PathArgs),
}

#[derive(Args, Debug)]
pub struct PathArgs {
    /// Key path
    pub path: String,
}

#[derive(Args, Debug)]
pub struct PutArgs {
    /// Key path
    pub path: String,

    /// Versions to retain (0 uses the backend default)
    #[arg(long)]
    pub max_versions: Option<u32>,

    /// Require check-and-set on writes
    #[arg(long)]
    pub cas_required: Option<bool>,

    /// Seconds until versions expire (0 clears the override)
    #[arg(long, allow_negative_numbers = true)]
    pub delete_version_after: Option<i64>,

    /// Custom metadata entry, replaces the whole map (repeatable)
    #[arg(long = "custom", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub custom: Vec<(String, String)>,

    /// Remove all custom metadata
    #[arg(long, conflicts_with = "custom")]
    pub clear_custom: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Path to list (empty lists the root)
    #[arg(default_value = "")]
    pub path: String,
}

pub async fn run(cmd: MetadataCommands, engine: &KvEngine) -> Result<()> {
    match cmd {
        MetadataCommands::Get(args) => get(args, engine).await,
        MetadataCommands::Put(args) => put(args, engine).await,
        MetadataCommands::List(args) => list(args, engine).await,
        MetadataCommands::Delete(args) => delete(args, engine).await,
        MetadataCommands::Exists(args) => exists(args, engine).await,
    }
}

async fn get(args: PathArgs, engine: &KvEngine) -> Result<()> {
    match engine.read_metadata(&args.path).await? {
        Some(view) => output::json(&view),
        None => bail!("No metadata found for {}", args.path),
    }
}

async fn put(args: PutArgs, engine: &KvEngine) -> Result<()> {
    let path = args.path.clone();
    output::finish(engine.write_metadata(build_request(args)).await?)?;
    output::success(&format!("Wrote metadata for {}", path));
    Ok(())
}

fn build_request(args: PutArgs) -> WriteMetadataRequest {
    let custom_metadata = if args.clear_custom {
        Some(BTreeMap::new())
    } else if args.custom.is_empty() {
        None
    } else {
        Some(args.custom.into_iter().collect())
    };

    WriteMetadataRequest {
        path: args.path,
        max_versions: args.max_versions,
        cas_required: args.cas_required,
        delete_version_after: args.delete_version_after,
        custom_metadata,
    }
}

async fn list(args: ListArgs, engine: &KvEngine) -> Result<()> {
    let keys = engine.list_metadata(&args.path).await?;
    output::json(&json!({ "keys": keys }))
}

async fn delete(args: PathArgs, engine: &KvEngine) -> Result<()> {
    engine.delete_metadata(&args.path).await?;
    output::success(&format!("Erased {}", args.path));
    Ok(())
}

async fn exists(args: PathArgs, engine: &KvEngine) -> Result<()> {
    let exists = engine.metadata_exists(&args.path).await?;
    output::json(&json!({ "path": args.path, "exists": exists }))
}
