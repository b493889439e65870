//! Handle lifecycle and per-key operations.

use crate::error::{CoreError, CoreResult};
use crate::key;
use crate::options::{merge, Mode, Options, ResolvedConfig};
use shelfdb_engine::{Engine, SetOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// An open ShelfDB store bound to a default collection.
///
/// Every operation runs as exactly one engine transaction. Operations
/// without a collection argument use the bound collection; the
/// `*_to_collection` / `*_from_collection` variants name it explicitly.
///
/// # Example
///
/// ```rust
/// use shelfdb_core::{Handle, Options};
/// use std::time::Duration;
///
/// let mut handle = Handle::open(Options::new().collection("users")).unwrap();
/// handle.set("alice", "a1", Duration::from_secs(10)).unwrap();
/// assert_eq!(handle.get("alice").unwrap(), "a1");
/// assert!(handle.get_from_collection("orders", "alice").unwrap_err().is_not_found());
/// handle.close().unwrap();
/// ```
#[derive(Debug)]
pub struct Handle {
    file: PathBuf,
    mode: Mode,
    collection: String,
    engine: Option<Engine>,
}

impl Handle {
    /// Opens a store.
    ///
    /// `options` are layered over [`Options::defaults`]: file `data.db`,
    /// collection `data`, memory mode and every-second sync.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Open`] if the engine cannot open the store and
    /// [`CoreError::Configuration`] if its configuration cannot be applied.
    pub fn open(options: Options) -> CoreResult<Self> {
        let resolved = merge(&Options::defaults(), &options);
        let engine = open_engine(&resolved.file)?;

        let handle = Self {
            file: resolved.file.clone(),
            mode: resolved.mode,
            collection: resolved
                .collection
                .clone()
                .unwrap_or_else(|| crate::options::DEFAULT_COLLECTION.to_string()),
            engine: Some(engine),
        };
        handle.configure(&resolved)?;

        tracing::debug!(
            file = %handle.file.display(),
            mode = %handle.mode,
            collection = %handle.collection,
            "handle opened"
        );
        Ok(handle)
    }

    /// Reconfigures an open handle.
    ///
    /// `options` are layered over an empty base, so anything not given is
    /// reset: the sync policy to [`shelfdb_engine::SyncPolicy::Never`], the
    /// auto-shrink settings to 100 % / 32 bytes, and both expiration hooks
    /// are removed. A collection in `options` rebinds the handle. In file
    /// mode the store's log is replayed again so its on-disk state is
    /// reloaded; a memory store keeps its data.
    ///
    /// On error the handle is left as it was: still open, on the same
    /// collection and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] after [`Handle::close`],
    /// [`CoreError::Configuration`] if the configuration is rejected, or
    /// [`CoreError::Open`] if the store cannot be reloaded.
    pub fn init(&mut self, options: Options) -> CoreResult<()> {
        let engine = self.engine()?;
        let resolved = merge(&Options::default(), &options);

        let config = resolved.apply_to(engine.read_config());
        config.validate().map_err(CoreError::configuration)?;

        if self.mode == Mode::File {
            engine
                .reload()
                .map_err(|source| CoreError::open(self.file.display().to_string(), source))?;
        }
        engine.set_config(config).map_err(CoreError::configuration)?;

        if let Some(collection) = resolved.collection {
            self.collection = collection;
        }

        tracing::debug!(collection = %self.collection, "handle reconfigured");
        Ok(())
    }

    /// Closes the handle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] if the handle is already closed, or the
    /// engine's error if the final sync fails.
    pub fn close(&mut self) -> CoreResult<()> {
        let engine = self.engine.take().ok_or(CoreError::Closed)?;
        engine.close()?;
        tracing::debug!(file = %self.file.display(), "handle closed");
        Ok(())
    }

    /// Returns `true` until [`Handle::close`] is called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.engine.is_some()
    }

    /// The bound collection.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The persistence mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The physical path of the store (`:memory:` in memory mode).
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    pub(crate) fn engine(&self) -> CoreResult<&Engine> {
        self.engine.as_ref().ok_or(CoreError::Closed)
    }

    /// Read-modify-write of the engine configuration.
    fn configure(&self, resolved: &ResolvedConfig) -> CoreResult<()> {
        let engine = self.engine()?;
        let config = resolved.apply_to(engine.read_config());
        engine.set_config(config).map_err(CoreError::configuration)
    }

    fn put(&self, collection: &str, key: &str, value: &str, opts: SetOptions) -> CoreResult<()> {
        let physical = key::encode(collection, key);
        self.engine()?
            .update(|tx| tx.set(&physical, value, opts).map(|_| ()))?;
        Ok(())
    }

    fn fetch(&self, collection: &str, key: &str) -> CoreResult<String> {
        let physical = key::encode(collection, key);
        Ok(self.engine()?.view(|tx| tx.get(&physical))?)
    }

    fn remove(&self, collection: &str, key: &str) -> CoreResult<()> {
        let physical = key::encode(collection, key);
        self.engine()?.update(|tx| tx.delete(&physical).map(|_| ()))?;
        Ok(())
    }

    fn remaining(&self, collection: &str, key: &str) -> CoreResult<Option<Duration>> {
        let physical = key::encode(collection, key);
        Ok(self.engine()?.view(|tx| tx.ttl(&physical))?)
    }

    /// Stores `value` under `key` in the bound collection, expiring after
    /// `ttl`. A zero `ttl` makes the entry expire immediately.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] or the engine's transaction error.
    pub fn set(&self, key: &str, value: &str, ttl: Duration) -> CoreResult<()> {
        self.put(&self.collection, key, value, SetOptions::expiring(ttl))
    }

    /// Same as [`Handle::set`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] or the engine's transaction error.
    pub fn update(&self, key: &str, value: &str, ttl: Duration) -> CoreResult<()> {
        self.set(key, value, ttl)
    }

    /// Stores `value` under `key` in the bound collection without expiration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] or the engine's transaction error.
    pub fn set_with_no_expiration(&self, key: &str, value: &str) -> CoreResult<()> {
        self.put(&self.collection, key, value, SetOptions::persistent())
    }

    /// Same as [`Handle::set_with_no_expiration`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] or the engine's transaction error.
    pub fn update_with_no_expiration(&self, key: &str, value: &str) -> CoreResult<()> {
        self.set_with_no_expiration(key, value)
    }

    /// Returns the value of `key` in the bound collection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the key is absent or expired.
    pub fn get(&self, key: &str) -> CoreResult<String> {
        self.fetch(&self.collection, key)
    }

    /// Deletes `key` from the bound collection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the key is absent or expired.
    pub fn delete(&self, key: &str) -> CoreResult<()> {
        self.remove(&self.collection, key)
    }

    /// Remaining lifetime of `key` in the bound collection, `None` if it
    /// never expires.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the key is absent or expired.
    pub fn ttl(&self, key: &str) -> CoreResult<Option<Duration>> {
        self.remaining(&self.collection, key)
    }

    /// Stores `value` under `key` in `collection`, expiring after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] or the engine's transaction error.
    pub fn set_to_collection(
        &self,
        collection: &str,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CoreResult<()> {
        self.put(collection, key, value, SetOptions::expiring(ttl))
    }

    /// Same as [`Handle::set_to_collection`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] or the engine's transaction error.
    pub fn update_to_collection(
        &self,
        collection: &str,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CoreResult<()> {
        self.set_to_collection(collection, key, value, ttl)
    }

    /// Stores `value` under `key` in `collection` without expiration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] or the engine's transaction error.
    pub fn set_to_collection_with_no_expiration(
        &self,
        collection: &str,
        key: &str,
        value: &str,
    ) -> CoreResult<()> {
        self.put(collection, key, value, SetOptions::persistent())
    }

    /// Returns the value of `key` in `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the key is absent or expired.
    pub fn get_from_collection(&self, collection: &str, key: &str) -> CoreResult<String> {
        self.fetch(collection, key)
    }

    /// Deletes `key` from `collection`.
    ///
    /// Unlike [`Handle::delete`], a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] or the engine's transaction error.
    pub fn delete_from_collection(&self, collection: &str, key: &str) -> CoreResult<()> {
        match self.remove(collection, key) {
            Err(CoreError::NotFound) => Ok(()),
            other => other,
        }
    }

    /// Remaining lifetime of `key` in `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the key is absent or expired.
    pub fn ttl_from_collection(&self, collection: &str, key: &str) -> CoreResult<Option<Duration>> {
        self.remaining(collection, key)
    }

    /// Rewrites the store's log down to its live entries.
    ///
    /// Does nothing in memory mode.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] or the engine's I/O error.
    pub fn shrink(&self) -> CoreResult<()> {
        self.engine()?.shrink()?;
        Ok(())
    }

    /// Current size of the store's log in bytes, `None` in memory mode.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] or the engine's I/O error.
    pub fn log_size(&self) -> CoreResult<Option<u64>> {
        Ok(self.engine()?.log_size()?)
    }
}

fn open_engine(file: &Path) -> CoreResult<Engine> {
    Engine::open(file).map_err(|source| CoreError::open(file.display().to_string(), source))
}
