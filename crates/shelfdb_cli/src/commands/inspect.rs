//! Inspect command implementation.

use super::print_json;
use serde::Serialize;
use shelfdb_engine::log::{LogReader, LogRecord};
use shelfdb_storage::{FileBackend, StorageBackend};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Log inspection result.
#[derive(Debug, Default, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Log size in bytes.
    pub log_size: u64,
    /// Number of `Set` records.
    pub set_records: usize,
    /// Number of `Delete` records.
    pub delete_records: usize,
    /// Number of committed transactions.
    pub commits: usize,
    /// Operations after the last commit marker, ignored on replay.
    pub uncommitted_records: usize,
    /// Bytes after the last complete frame.
    pub torn_bytes: u64,
    /// Keys present after replay, including ones already expired.
    pub keys: usize,
    /// Key counts per collection (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections: Option<BTreeMap<String, usize>>,
}

/// Runs the inspect command.
///
/// Reads the log directly; the store is not opened, so no expiration or
/// repair happens.
pub fn run(path: &Path, show_collections: bool, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }

    let backend = FileBackend::open(path)?;
    let data = backend.read_all()?;
    let mut result = analyze(&data)?;
    result.path = path.display().to_string();

    if !show_collections {
        result.collections = None;
    }

    if json {
        return print_json(&result);
    }
    print_text_output(&result);
    Ok(())
}

/// Replays `data` the way the engine does, counting as it goes.
fn analyze(data: &[u8]) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let mut result = InspectResult {
        log_size: data.len() as u64,
        ..InspectResult::default()
    };
    let mut live = BTreeSet::new();
    let mut pending = Vec::new();

    let mut reader = LogReader::new(data);
    for item in reader.by_ref() {
        let (_, record) = item?;
        match record {
            LogRecord::Set { .. } => {
                result.set_records += 1;
                pending.push(record);
            }
            LogRecord::Delete { .. } => {
                result.delete_records += 1;
                pending.push(record);
            }
            LogRecord::Commit { .. } => {
                result.commits += 1;
                for op in pending.drain(..) {
                    match op {
                        LogRecord::Set { key, .. } => {
                            live.insert(key);
                        }
                        LogRecord::Delete { key } => {
                            live.remove(&key);
                        }
                        LogRecord::Commit { .. } => {}
                    }
                }
            }
        }
    }
    result.uncommitted_records = pending.len();
    result.torn_bytes = (data.len() - reader.offset()) as u64;
    result.keys = live.len();

    let mut collections = BTreeMap::new();
    for key in &live {
        let collection = key.split_once(':').map_or("", |(c, _)| c);
        *collections.entry(collection.to_string()).or_insert(0) += 1;
    }
    result.collections = Some(collections);

    Ok(result)
}

fn print_text_output(result: &InspectResult) {
    println!("ShelfDB Store: {}", result.path);
    println!("================");
    println!();
    println!("Log size:       {} bytes", result.log_size);
    println!("Set records:    {}", result.set_records);
    println!("Delete records: {}", result.delete_records);
    println!("Commits:        {}", result.commits);
    if result.uncommitted_records > 0 || result.torn_bytes > 0 {
        println!(
            "Tail:           {} uncommitted record(s), {} torn byte(s)",
            result.uncommitted_records, result.torn_bytes
        );
    }
    println!("Keys:           {}", result.keys);

    if let Some(collections) = &result.collections {
        println!();
        println!("Collections:");
        for (name, count) in collections {
            println!("  {name}: {count} key(s)");
        }
    }
}
