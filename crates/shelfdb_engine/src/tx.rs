//! Transactions.

use crate::error::{EngineError, EngineResult};
use crate::log::LogRecord;
use crate::pattern;
use crate::state::{self, Item, State};
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use std::collections::HashMap;
use std::time::Duration;

/// Options for [`Tx::set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Whether the entry expires.
    pub expires: bool,
    /// Lifetime of the entry, counted from the write. Ignored unless
    /// `expires` is set; a zero TTL makes the entry expire immediately.
    pub ttl: Duration,
}

impl SetOptions {
    /// Options for an entry that expires after `ttl`.
    #[must_use]
    pub const fn expiring(ttl: Duration) -> Self {
        Self { expires: true, ttl }
    }

    /// Options for an entry that never expires.
    #[must_use]
    pub const fn persistent() -> Self {
        Self {
            expires: false,
            ttl: Duration::ZERO,
        }
    }
}

enum Guard<'a> {
    Read(RwLockReadGuard<'a, State>),
    Write(RwLockWriteGuard<'a, State>),
}

/// A transaction over the store.
///
/// Read-only transactions share the store with other readers. A read-write
/// transaction has it to itself; its changes are applied in place, logged on
/// commit and reverted if the transaction fails.
pub struct Tx<'a> {
    guard: Guard<'a>,
    now: u64,
    /// Value of each touched key before its first modification.
    undo: HashMap<String, Option<Item>>,
    records: Vec<LogRecord>,
}

impl<'a> Tx<'a> {
    pub(crate) fn read(guard: RwLockReadGuard<'a, State>) -> Self {
        Self::new(Guard::Read(guard))
    }

    pub(crate) fn write(guard: RwLockWriteGuard<'a, State>) -> Self {
        Self::new(Guard::Write(guard))
    }

    fn new(guard: Guard<'a>) -> Self {
        Self {
            guard,
            now: state::now_millis(),
            undo: HashMap::new(),
            records: Vec::new(),
        }
    }

    fn state(&self) -> &State {
        match &self.guard {
            Guard::Read(g) => &**g,
            Guard::Write(g) => &**g,
        }
    }

    fn state_mut(&mut self) -> EngineResult<&mut State> {
        match &mut self.guard {
            Guard::Read(_) => Err(EngineError::TxNotWritable),
            Guard::Write(g) => Ok(&mut **g),
        }
    }

    /// Returns `true` for read-write transactions.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        matches!(self.guard, Guard::Write(_))
    }

    /// Inserts or replaces `key`.
    ///
    /// Returns the previous value if one was live.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TxNotWritable`] in a read-only transaction.
    pub fn set(&mut self, key: &str, value: &str, opts: SetOptions) -> EngineResult<Option<String>> {
        let now = self.now;
        let expires_at = opts.expires.then(|| state::expires_at(now, opts.ttl));
        let item = Item {
            value: value.to_string(),
            expires_at,
        };

        let previous = self.state_mut()?.insert(key.to_string(), item);
        let live = previous
            .as_ref()
            .filter(|p| !p.is_expired(now))
            .map(|p| p.value.clone());

        self.undo.entry(key.to_string()).or_insert(previous);
        self.records.push(LogRecord::Set {
            key: key.to_string(),
            value: value.to_string(),
            expires_at,
        });

        tracing::trace!(key, expires_at, "set");
        Ok(live)
    }

    /// Returns the value of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the key is absent or expired.
    pub fn get(&self, key: &str) -> EngineResult<String> {
        self.state()
            .get_live(key, self.now)
            .map(|item| item.value.clone())
            .ok_or(EngineError::NotFound)
    }

    /// Removes `key` and returns its value.
    ///
    /// An expired entry is reported as [`EngineError::NotFound`]. Its
    /// removal is staged in this transaction, so it only sticks if the
    /// transaction body handles the error and commits; returning the error
    /// from [`crate::Engine::update`] rolls it back.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the key is absent or expired,
    /// [`EngineError::TxNotWritable`] in a read-only transaction.
    pub fn delete(&mut self, key: &str) -> EngineResult<String> {
        let now = self.now;
        let previous = self
            .state_mut()?
            .remove(key)
            .ok_or(EngineError::NotFound)?;

        let expired = previous.is_expired(now);
        let value = previous.value.clone();

        self.undo.entry(key.to_string()).or_insert(Some(previous));
        self.records.push(LogRecord::Delete {
            key: key.to_string(),
        });

        tracing::trace!(key, "delete");
        if expired {
            return Err(EngineError::NotFound);
        }
        Ok(value)
    }

    /// Visits the live entries whose keys match the glob `pattern`, in
    /// ascending key order, until `visit` returns `false`.
    ///
    /// See [`crate::pattern`] for the glob syntax.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` leaves room for backends that
    /// read lazily.
    pub fn ascend_keys<F>(&self, pattern: &str, mut visit: F) -> EngineResult<()>
    where
        F: FnMut(&str, &str) -> bool,
    {
        let prefix = pattern::literal_prefix(pattern);
        let wildcard = pattern::has_wildcards(pattern);

        for (key, item) in self.state().range_from(&prefix) {
            if !key.starts_with(prefix.as_ref()) {
                break;
            }
            if item.is_expired(self.now) || (wildcard && !pattern::matches(key, pattern)) {
                continue;
            }
            if !wildcard && *key != *prefix {
                continue;
            }
            if !visit(key, &item.value) {
                break;
            }
        }
        Ok(())
    }

    /// Returns the remaining lifetime of `key`, `None` if it never expires.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the key is absent or expired.
    pub fn ttl(&self, key: &str) -> EngineResult<Option<Duration>> {
        self.state()
            .get_live(key, self.now)
            .map(|item| item.remaining(self.now))
            .ok_or(EngineError::NotFound)
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state().live_len(self.now)
    }

    /// Returns `true` if there are no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value of `key` if it is present but already expired.
    pub(crate) fn expired_value(&self, key: &str) -> Option<String> {
        self.state()
            .get(key)
            .filter(|item| item.is_expired(self.now))
            .map(|item| item.value.clone())
    }

    /// Log records produced so far.
    pub(crate) fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Reverts every change made by this transaction.
    pub(crate) fn rollback(&mut self) {
        let undo = std::mem::take(&mut self.undo);
        self.records.clear();

        if let Guard::Write(state) = &mut self.guard {
            for (key, original) in undo {
                match original {
                    Some(item) => {
                        state.insert(key, item);
                    }
                    None => {
                        state.remove(&key);
                    }
                }
            }
        }
    }
}
