//! In-memory state of an open store.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time in Unix milliseconds.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Converts a TTL into an absolute expiration instant.
pub(crate) fn expires_at(now: u64, ttl: Duration) -> u64 {
    let ttl = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    now.saturating_add(ttl)
}

/// A stored value with its optional expiration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Item {
    pub(crate) value: String,
    pub(crate) expires_at: Option<u64>,
}

impl Item {
    pub(crate) fn is_expired(&self, now: u64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    /// Remaining lifetime, `None` for entries that never expire.
    pub(crate) fn remaining(&self, now: u64) -> Option<Duration> {
        self.expires_at
            .map(|at| Duration::from_millis(at.saturating_sub(now)))
    }
}

/// Ordered items plus an index of expiration instants.
///
/// Expired items stay in the map until the sweeper removes them; readers
/// filter them out with [`Item::is_expired`].
#[derive(Debug, Default)]
pub(crate) struct State {
    items: BTreeMap<String, Item>,
    expirations: BTreeSet<(u64, String)>,
}

impl State {
    pub(crate) fn get(&self, key: &str) -> Option<&Item> {
        self.items.get(key)
    }

    /// Returns the live item for `key`, hiding expired ones.
    pub(crate) fn get_live(&self, key: &str, now: u64) -> Option<&Item> {
        self.items.get(key).filter(|item| !item.is_expired(now))
    }

    pub(crate) fn insert(&mut self, key: String, item: Item) -> Option<Item> {
        if let Some(at) = item.expires_at {
            self.expirations.insert((at, key.clone()));
        }
        let previous = self.items.insert(key.clone(), item);
        if let Some(at) = previous.as_ref().and_then(|p| p.expires_at) {
            self.unindex(at, &key);
        }
        previous
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Item> {
        let previous = self.items.remove(key)?;
        if let Some(at) = previous.expires_at {
            self.unindex(at, key);
        }
        Some(previous)
    }

    fn unindex(&mut self, at: u64, key: &str) {
        // Re-inserting the same key with the same instant keeps the entry.
        if self.items.get(key).and_then(|i| i.expires_at) != Some(at) {
            self.expirations.remove(&(at, key.to_string()));
        }
    }

    /// Keys whose expiration instant is at or before `now`, soonest first.
    pub(crate) fn expired_keys(&self, now: u64) -> Vec<String> {
        self.expirations
            .range(..(now.saturating_add(1), String::new()))
            .map(|(_, key)| key.clone())
            .collect()
    }

    /// Items with keys `>= start`, in ascending order.
    pub(crate) fn range_from<'a>(
        &'a self,
        start: &str,
    ) -> impl Iterator<Item = (&'a String, &'a Item)> + 'a {
        self.items
            .range::<str, _>((Bound::Included(start), Bound::Unbounded))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Item)> {
        self.items.iter()
    }

    pub(crate) fn live_len(&self, now: u64) -> usize {
        self.items.values().filter(|i| !i.is_expired(now)).count()
    }
}
