//! Per-key and collection commands.

use super::print_json;
use serde::Serialize;
use shelfdb_core::Handle;
use shelfdb_engine::pattern;
use std::time::Duration;

/// A single key lookup.
#[derive(Debug, Serialize)]
pub struct Entry {
    /// Collection the key belongs to.
    pub collection: String,
    /// Logical key.
    pub key: String,
    /// Stored value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Remaining lifetime in seconds; absent when the key never expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<f64>,
}

/// A key listing.
#[derive(Debug, Serialize)]
pub struct KeyList {
    /// Collection that was listed.
    pub collection: String,
    /// Logical keys in ascending order.
    pub keys: Vec<String>,
}

/// Outcome of a bulk delete.
#[derive(Debug, Serialize)]
pub struct Deleted {
    /// Collection that was scanned.
    pub collection: String,
    /// Number of deleted entries.
    pub deleted: usize,
}

fn entry(handle: &Handle, key: &str) -> Entry {
    Entry {
        collection: handle.collection().to_string(),
        key: key.to_string(),
        value: None,
        ttl_secs: None,
    }
}

/// Runs the set command.
pub fn set(
    handle: &Handle,
    key: &str,
    value: &str,
    ttl: Option<u64>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match ttl {
        Some(secs) => handle.set(key, value, Duration::from_secs(secs))?,
        None => handle.set_with_no_expiration(key, value)?,
    }

    if json {
        return print_json(&Entry {
            value: Some(value.to_string()),
            ttl_secs: ttl.map(|secs| secs as f64),
            ..entry(handle, key)
        });
    }
    println!("OK");
    Ok(())
}

/// Runs the get command.
pub fn get(handle: &Handle, key: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let value = handle.get(key)?;
    if json {
        return print_json(&Entry {
            value: Some(value),
            ..entry(handle, key)
        });
    }
    println!("{value}");
    Ok(())
}

/// Runs the delete command.
///
/// With `if_exists` a missing key is not an error, matching
/// [`Handle::delete_from_collection`].
pub fn delete(
    handle: &Handle,
    key: &str,
    if_exists: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let deleted = match handle.delete(key) {
        Ok(()) => 1,
        Err(e) if if_exists && e.is_not_found() => 0,
        Err(e) => return Err(e.into()),
    };

    if json {
        return print_json(&Deleted {
            collection: handle.collection().to_string(),
            deleted,
        });
    }
    println!("Deleted {deleted} key(s)");
    Ok(())
}

/// Runs the ttl command.
pub fn ttl(handle: &Handle, key: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let remaining = handle.ttl(key)?;
    if json {
        return print_json(&Entry {
            ttl_secs: remaining.map(|d| d.as_secs_f64()),
            ..entry(handle, key)
        });
    }
    match remaining {
        Some(d) => println!("{:.3}s", d.as_secs_f64()),
        None => println!("no expiration"),
    }
    Ok(())
}

/// Runs the keys command.
pub fn keys(handle: &Handle, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let list = KeyList {
        collection: handle.collection().to_string(),
        keys: handle.get_keys()?,
    };
    if json {
        return print_json(&list);
    }
    for key in &list.keys {
        println!("{key}");
    }
    Ok(())
}

/// Runs the delete-where command.
///
/// An entry is deleted when it matches every given glob; without any glob
/// nothing is deleted.
pub fn delete_where(
    handle: &Handle,
    key_glob: Option<&str>,
    value_glob: Option<&str>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if key_glob.is_none() && value_glob.is_none() {
        return Err("delete-where needs --key or --value".into());
    }

    let deleted = handle.delete_where(|physical, value| {
        key_glob.map_or(true, |g| pattern::matches(physical, g))
            && value_glob.map_or(true, |g| pattern::matches(value, g))
    })?;
    tracing::info!(collection = handle.collection(), deleted, "delete-where finished");

    if json {
        return print_json(&Deleted {
            collection: handle.collection().to_string(),
            deleted,
        });
    }
    println!("Deleted {deleted} key(s)");
    Ok(())
}
