//! Physical key layout.
//!
//! Collections share one flat key space: the physical key of `key` in
//! `collection` is `collection:key`. Nothing is escaped, so a collection
//! whose name is another's name plus `:` and more would overlap with it.

use shelfdb_engine::pattern;

/// Separator between collection and logical key.
pub const SEPARATOR: char = ':';

/// Builds the physical key of `key` in `collection`.
#[must_use]
pub fn encode(collection: &str, key: &str) -> String {
    let mut physical = String::with_capacity(collection.len() + 1 + key.len());
    physical.push_str(collection);
    physical.push(SEPARATOR);
    physical.push_str(key);
    physical
}

/// Strips the `collection_len` bytes of collection name and the separator.
///
/// Only meaningful for keys known to carry that prefix; anything shorter
/// decodes to the empty string.
#[must_use]
pub fn decode(physical: &str, collection_len: usize) -> &str {
    physical.get(collection_len + 1..).unwrap_or_default()
}

/// Glob matching every physical key of `collection`.
///
/// Wildcards in the collection name are escaped, so `a?` matches only its
/// own keys and not those of `ab`.
#[must_use]
pub fn prefix_pattern(collection: &str) -> String {
    encode(&pattern::escape(collection), "*")
}
