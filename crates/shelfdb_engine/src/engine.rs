//! The store handle and the state shared by every handle on one file.

use crate::config::{EngineConfig, SyncPolicy};
use crate::error::{EngineError, EngineResult};
use crate::lock::StoreLock;
use crate::log::{Log, LogRecord};
use crate::state::{self, Item, State};
use crate::sweeper;
use crate::tx::Tx;
use parking_lot::{Mutex, RwLock};
use shelfdb_storage::{FileBackend, StorageBackend};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, OnceLock, Weak};
use std::thread;

/// Path that opens a store living only in memory.
pub const MEMORY_PATH: &str = ":memory:";

struct RegistryEntry {
    id: u64,
    shared: Weak<Shared>,
}

type Registry = Mutex<HashMap<PathBuf, RegistryEntry>>;

/// File-backed stores open in this process, by canonical path.
fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// State of one physical store.
pub(crate) struct Shared {
    id: u64,
    path: Option<PathBuf>,
    pub(crate) state: RwLock<State>,
    log: Mutex<Option<Log>>,
    pub(crate) config: RwLock<EngineConfig>,
    /// Set when committed data has not been synced yet.
    dirty: AtomicBool,
    lock: Option<StoreLock>,
    /// Set once the store is listed in the registry.
    registered: AtomicBool,
    /// Dropping the sender stops the sweeper.
    _stop: Sender<()>,
}

impl Shared {
    fn create(
        path: Option<PathBuf>,
        log: Option<Log>,
        lock: Option<StoreLock>,
        config: EngineConfig,
    ) -> EngineResult<Arc<Self>> {
        config.validate()?;

        let (stop, stopped) = mpsc::channel();
        let mut shared = Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            path,
            state: RwLock::new(State::default()),
            log: Mutex::new(log),
            config: RwLock::new(config),
            dirty: AtomicBool::new(false),
            lock,
            registered: AtomicBool::new(false),
            _stop: stop,
        };
        shared.load()?;

        let shared = Arc::new(shared);
        sweeper::spawn(&shared, stopped)?;
        Ok(shared)
    }

    fn load(&mut self) -> EngineResult<()> {
        let Some(log) = self.log.get_mut() else {
            return Ok(());
        };
        let state = replay(log, self.path.as_deref())?;
        *self.state.get_mut() = state;
        Ok(())
    }

    /// Replays the log again and swaps the result in. On error the current
    /// state is kept.
    fn reload(&self) -> EngineResult<()> {
        let mut state = self.state.write();
        let mut log = self.log.lock();
        let Some(log) = log.as_mut() else {
            return Ok(());
        };
        *state = replay(log, self.path.as_deref())?;
        Ok(())
    }

    pub(crate) fn update<T, F>(&self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&mut Tx<'_>) -> EngineResult<T>,
    {
        let mut tx = Tx::write(self.state.write());
        let result = f(&mut tx).and_then(|value| {
            self.commit(&tx)?;
            Ok(value)
        });
        if result.is_err() {
            tx.rollback();
        }
        result
    }

    fn view<T, F>(&self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&Tx<'_>) -> EngineResult<T>,
    {
        let tx = Tx::read(self.state.read());
        f(&tx)
    }

    fn commit(&self, tx: &Tx<'_>) -> EngineResult<()> {
        if tx.records().is_empty() {
            return Ok(());
        }

        let mut log = self.log.lock();
        let Some(log) = log.as_mut() else {
            return Ok(());
        };

        log.append_batch(tx.records())?;
        if self.config.read().sync_policy == SyncPolicy::Always {
            log.sync()?;
        } else {
            self.dirty.store(true, Ordering::Release);
        }
        Ok(())
    }

    pub(crate) fn sync_if_dirty(&self) -> EngineResult<()> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(log) = self.log.lock().as_mut() {
            if let Err(err) = log.sync() {
                self.dirty.store(true, Ordering::Release);
                return Err(err);
            }
        }
        Ok(())
    }

    pub(crate) fn shrink(&self) -> EngineResult<()> {
        let state = self.state.read();
        let mut log = self.log.lock();
        let Some(log) = log.as_mut() else {
            return Ok(());
        };

        let now = state::now_millis();
        let records: Vec<_> = state
            .iter()
            .filter(|(_, item)| !item.is_expired(now))
            .map(|(key, item)| LogRecord::Set {
                key: key.clone(),
                value: item.value.clone(),
                expires_at: item.expires_at,
            })
            .collect();

        let before = log.size()?;
        log.rewrite(&records)?;
        self.dirty.store(false, Ordering::Release);

        tracing::info!(
            path = ?self.path,
            before,
            after = log.base_size(),
            entries = records.len(),
            "log shrunk"
        );
        Ok(())
    }

    /// Current and post-load/shrink log sizes, `None` without a log.
    pub(crate) fn log_sizes(&self) -> EngineResult<Option<(u64, u64)>> {
        match self.log.lock().as_ref() {
            Some(log) => Ok(Some((log.size()?, log.base_size()))),
            None => Ok(None),
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(log) = self.log.get_mut() {
            if let Err(err) = log.sync() {
                tracing::warn!(path = ?self.path, error = %err, "final sync failed");
            }
        }

        // Unregister and unlock under the registry mutex so a concurrent
        // open never sees the path free while the lock is still held.
        let registered = *self.registered.get_mut();
        if let (true, Some(path)) = (registered, &self.path) {
            let mut registry = registry().lock();
            if registry.get(path).is_some_and(|e| e.id == self.id) {
                registry.remove(path);
            }
            self.lock.take();
        }
        tracing::debug!(path = ?self.path, "store closed");
    }
}

/// An open store.
///
/// Opening the same file twice in one process yields two handles on the
/// same underlying state; a second process is refused with
/// [`EngineError::DatabaseLocked`]. The store is closed when the last
/// handle is dropped or closed.
///
/// # Example
///
/// ```rust
/// use shelfdb_engine::{Engine, SetOptions};
///
/// let engine = Engine::open_in_memory().unwrap();
/// engine
///     .update(|tx| tx.set("users:alice", "a1", SetOptions::persistent()).map(|_| ()))
///     .unwrap();
/// let value = engine.view(|tx| tx.get("users:alice")).unwrap();
/// assert_eq!(value, "a1");
/// ```
pub struct Engine {
    shared: Arc<Shared>,
}

impl Engine {
    /// Opens the store at `path` with the default configuration.
    ///
    /// [`MEMORY_PATH`] opens a store that lives only in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or locked, or if its
    /// log is corrupted.
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        Self::open_with_config(path, EngineConfig::default())
    }

    /// Opens the store at `path`.
    ///
    /// If the file is already open in this process, the existing state and
    /// its configuration are shared and `config` is ignored.
    ///
    /// # Errors
    ///
    /// See [`Engine::open`]. Also fails if `config` is invalid.
    pub fn open_with_config(path: impl AsRef<Path>, config: EngineConfig) -> EngineResult<Self> {
        let path = path.as_ref();
        if path.as_os_str() == MEMORY_PATH {
            return Self::open_in_memory_with_config(config);
        }

        let path = canonical_path(path)?;
        loop {
            let mut registry = registry().lock();
            if let Some(entry) = registry.get(&path) {
                if let Some(shared) = entry.shared.upgrade() {
                    tracing::debug!(path = %path.display(), "reusing open store");
                    return Ok(Self { shared });
                }
                // The last handle is being dropped; wait until it unregisters.
                drop(registry);
                thread::yield_now();
                continue;
            }

            let lock = StoreLock::acquire(&path)?;
            let backend = FileBackend::open(&path)?;
            let shared = Shared::create(
                Some(path.clone()),
                Some(Log::new(Box::new(backend))),
                Some(lock),
                config,
            )?;
            registry.insert(
                path,
                RegistryEntry {
                    id: shared.id,
                    shared: Arc::downgrade(&shared),
                },
            );
            shared.registered.store(true, Ordering::Release);
            return Ok(Self { shared });
        }
    }

    /// Opens a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the sweeper thread cannot be started.
    pub fn open_in_memory() -> EngineResult<Self> {
        Self::open_in_memory_with_config(EngineConfig::default())
    }

    fn open_in_memory_with_config(config: EngineConfig) -> EngineResult<Self> {
        let shared = Shared::create(None, None, None, config)?;
        Ok(Self { shared })
    }

    /// Opens a store whose log lives on an arbitrary backend.
    ///
    /// The store is private to the returned handle: it is neither registered
    /// nor locked.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be replayed.
    pub fn with_backend(
        backend: Box<dyn StorageBackend>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        let shared = Shared::create(None, Some(Log::new(backend)), None, config)?;
        Ok(Self { shared })
    }

    /// Returns a copy of the current configuration.
    #[must_use]
    pub fn read_config(&self) -> EngineConfig {
        self.shared.config.read().clone()
    }

    /// Replaces the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if the configuration is rejected.
    pub fn set_config(&self, config: EngineConfig) -> EngineResult<()> {
        config.validate()?;
        tracing::debug!(?config, "config updated");
        *self.shared.config.write() = config;
        Ok(())
    }

    /// Runs `f` in a read-write transaction.
    ///
    /// The transaction commits if `f` returns `Ok`. If `f` or the commit
    /// fails, every change made by `f` is reverted and the error returned.
    ///
    /// # Errors
    ///
    /// Returns the error of `f` or of the log write.
    pub fn update<T, F>(&self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&mut Tx<'_>) -> EngineResult<T>,
    {
        self.shared.update(f)
    }

    /// Runs `f` in a read-only transaction.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`.
    pub fn view<T, F>(&self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&Tx<'_>) -> EngineResult<T>,
    {
        self.shared.view(f)
    }

    /// Rewrites the log so it only holds the live entries.
    ///
    /// In-memory stores have no log; this is a no-op for them.
    ///
    /// # Errors
    ///
    /// Returns an error if the new log cannot be written; the old one is
    /// kept in that case.
    pub fn shrink(&self) -> EngineResult<()> {
        self.shared.shrink()
    }

    /// Runs one maintenance pass now: expiration, sync and auto-shrink.
    ///
    /// The sweeper thread does the same every `sweep_interval`.
    ///
    /// # Errors
    ///
    /// Returns the first error of the pass. An expiration hook error rolls
    /// back the expiration part.
    pub fn sweep(&self) -> EngineResult<()> {
        sweeper::pass(&self.shared)
    }

    /// Forces committed data to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&self) -> EngineResult<()> {
        self.shared.dirty.store(true, Ordering::Release);
        self.shared.sync_if_dirty()
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state.read().live_len(state::now_millis())
    }

    /// Returns `true` if there are no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Canonical path of a file-backed store.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.shared.path.as_deref()
    }

    /// Current log size in bytes, `None` for in-memory stores.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    pub fn log_size(&self) -> EngineResult<Option<u64>> {
        Ok(self.shared.log_sizes()?.map(|(size, _)| size))
    }

    /// Replays the store's log from storage, as closing and reopening it
    /// would, without giving up the lock. Every handle on the store sees
    /// the reloaded state. On error the current state is kept.
    ///
    /// Does nothing for in-memory stores.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or is corrupted.
    pub fn reload(&self) -> EngineResult<()> {
        self.shared.reload()
    }

    /// Closes this handle.
    ///
    /// Committed data is synced first. The store itself stays open while
    /// other handles on it exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails.
    pub fn close(self) -> EngineResult<()> {
        self.sync()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("path", &self.shared.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
impl Engine {
    /// Entries physically present, expired ones included.
    pub(crate) fn physical_len(&self) -> usize {
        self.shared.state.read().iter().count()
    }
}

/// Rebuilds the state from the committed records of `log`, dropping
/// entries that expired while the store was closed.
fn replay(log: &mut Log, path: Option<&Path>) -> EngineResult<State> {
    let recovered = log.recover()?;
    if recovered.discarded > 0 {
        tracing::warn!(
            bytes = recovered.discarded,
            "discarded incomplete transaction at the end of the log"
        );
    }

    let now = state::now_millis();
    let mut state = State::default();
    for record in recovered.records {
        match record {
            LogRecord::Set {
                key,
                value,
                expires_at,
            } => {
                let item = Item { value, expires_at };
                if item.is_expired(now) {
                    state.remove(&key);
                } else {
                    state.insert(key, item);
                }
            }
            LogRecord::Delete { key } => {
                state.remove(&key);
            }
            LogRecord::Commit { .. } => {}
        }
    }

    tracing::debug!(
        ?path,
        entries = state.live_len(now),
        log_size = log.base_size(),
        "store loaded"
    );
    Ok(state)
}

/// Creates the file (and its directories) if needed and resolves its path.
fn canonical_path(path: &Path) -> EngineResult<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)?;
    Ok(fs::canonicalize(path)?)
}
