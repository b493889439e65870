//! Shrink command implementation.

use super::print_json;
use serde::Serialize;
use shelfdb_core::Handle;

/// Shrink outcome.
#[derive(Debug, Serialize)]
pub struct ShrinkResult {
    /// Store path.
    pub path: String,
    /// Log size before the rewrite, if the store has a log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_before: Option<u64>,
    /// Log size after the rewrite, if the store has a log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_after: Option<u64>,
}

/// Runs the shrink command.
pub fn run(handle: &Handle, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let size_before = handle.log_size()?;
    handle.shrink()?;
    let result = ShrinkResult {
        path: handle.file().display().to_string(),
        size_before,
        size_after: handle.log_size()?,
    };

    if json {
        return print_json(&result);
    }
    match (result.size_before, result.size_after) {
        (Some(before), Some(after)) => {
            println!("Shrunk {}: {before} -> {after} bytes", result.path);
        }
        _ => println!("Nothing to shrink for {}", result.path),
    }
    Ok(())
}
