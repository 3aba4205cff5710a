//! Versioned secret data commands

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use clap::{Args, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use vkv_engine::{KvEngine, SecretVersion, WriteDataRequest};

use crate::output;

#[derive(Subcommand, Debug)]
pub enum KvCommands {
    /// Write a new version
    Put(PutArgs),

    /// Read a version (current by default)
    #[command(disable_version_flag = true)]
    Get(GetArgs),

    /// Soft-delete versions (current by default)
    Delete(VersionsArgs),

    /// Restore soft-deleted versions
    Undelete(RequiredVersionsArgs),

    /// Permanently remove versions
    Destroy(RequiredVersionsArgs),
}

#[derive(Args, Debug)]
pub struct PutArgs {
    /// Key path
    pub path: String,

    /// Secret value
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub value: Option<String>,

    /// Read the secret value from a file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Expected current version (0 when the key must be new)
    #[arg(long)]
    pub cas: Option<u64>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Key path
    pub path: String,

    /// Version to read
    #[arg(long)]
    pub version: Option<u64>,
}

#[derive(Args, Debug)]
pub struct VersionsArgs {
    /// Key path
    pub path: String,

    /// Comma-separated version numbers
    #[arg(long, value_delimiter = ',')]
    pub versions: Vec<u64>,
}

#[derive(Args, Debug)]
pub struct RequiredVersionsArgs {
    /// Key path
    pub path: String,

    /// Comma-separated version numbers
    #[arg(long, value_delimiter = ',', required = true)]
    pub versions: Vec<u64>,
}

pub async fn run(cmd: KvCommands, engine: &KvEngine) -> Result<()> {
    match cmd {
        KvCommands::Put(args) => put(args, engine).await,
        KvCommands::Get(args) => get(args, engine).await,
        KvCommands::Delete(args) => {
            output::finish(engine.delete_versions(&args.path, &args.versions).await?)?;
            output::success(&format!("Deleted versions of {}", args.path));
            Ok(())
        }
        KvCommands::Undelete(args) => {
            output::finish(engine.undelete_versions(&args.path, &args.versions).await?)?;
            output::success(&format!("Undeleted versions of {}", args.path));
            Ok(())
        }
        KvCommands::Destroy(args) => {
            output::finish(engine.destroy_versions(&args.path, &args.versions).await?)?;
            output::success(&format!("Destroyed versions of {}", args.path));
            Ok(())
        }
    }
}

async fn put(args: PutArgs, engine: &KvEngine) -> Result<()> {
    let data = match (&args.value, &args.file) {
        (Some(value), _) => value.clone().into_bytes(),
        (None, Some(file)) => tokio::fs::read(file)
            .await
            .with_context(|| format!("Failed to read file: {:?}", file))?,
        (None, None) => bail!("Provide a value or --file"),
    };

    let mut req = WriteDataRequest::new(args.path, data);
    req.cas = args.cas;

    if let Some(written) = output::finish(engine.write_data(req).await?)? {
        output::json(&written)?;
    }
    Ok(())
}

async fn get(args: GetArgs, engine: &KvEngine) -> Result<()> {
    match engine.read_data(&args.path, args.version).await? {
        Some(secret) => output::json(&render_secret(&secret)),
        None => bail!("No secret found at {}", args.path),
    }
}

/// JSON form of a secret: UTF-8 data as text, anything else as base64
fn render_secret(secret: &SecretVersion) -> Value {
    let mut out = json!({
        "version": secret.version,
        "metadata": secret.metadata,
        "custom_metadata": secret.custom_metadata,
    });

    if let Some(bytes) = &secret.data {
        match std::str::from_utf8(bytes) {
            Ok(text) => out["data"] = json!(text),
            Err(_) => out["data_base64"] = json!(STANDARD.encode(bytes)),
        }
    }
    out
}
