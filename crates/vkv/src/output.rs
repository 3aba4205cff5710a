//! Terminal output utilities

use anyhow::{bail, Result};
use console::style;
use serde::Serialize;
use vkv_engine::Response;

/// Print a warning message to stderr
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Print a success message to stderr, keeping stdout for data
pub fn success(msg: &str) {
    eprintln!("{} {}", style("✓").green().bold(), msg);
}

/// Print a value as pretty JSON on stdout
pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Surface warnings and turn a rejected request into an error.
///
/// Returns the response data, if any.
pub fn finish<T>(resp: Response<T>) -> Result<Option<T>> {
    for w in &resp.warnings {
        warning(w);
    }
    if let Some(error) = resp.error {
        bail!(error);
    }
    Ok(resp.data)
}
