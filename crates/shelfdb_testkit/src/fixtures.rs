//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores
//! and common test scenarios.

use shelfdb_core::{Handle, Mode, NameGenerator, Options};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Collection the fixtures bind by default.
pub const TEST_COLLECTION: &str = "test";

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The open handle.
    pub handle: Handle,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a new in-memory test store.
    pub fn memory() -> Self {
        Self::memory_with(Options::new())
    }

    /// Creates a new in-memory test store with extra options.
    pub fn memory_with(options: Options) -> Self {
        let options = Options::new()
            .mode(Mode::Memory)
            .collection(TEST_COLLECTION)
            .merge(options);
        Self {
            handle: Handle::open(options).expect("Failed to open in-memory store"),
            temp_dir: None,
        }
    }

    /// Creates a new file-based test store in a fresh temporary directory.
    pub fn file() -> Self {
        Self::file_with(Options::new())
    }

    /// Creates a new file-based test store with extra options.
    ///
    /// Auto-shrink is disabled unless `options` turns it back on, so the
    /// log only changes when a test asks for it.
    pub fn file_with(options: Options) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let name = NameGenerator::new("test-").next_name();
        let options = Options::new()
            .file(temp_dir.path().join(name))
            .mode(Mode::File)
            .collection(TEST_COLLECTION)
            .auto_shrink_disabled(true)
            .merge(options);

        Self {
            handle: Handle::open(options).expect("Failed to open file store"),
            temp_dir: Some(temp_dir),
        }
    }

    /// Returns the store file if file-based, `None` if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|_| self.handle.file().to_path_buf())
    }

    /// Closes the handle and opens the same file again, bound to
    /// `collection`.
    ///
    /// # Panics
    ///
    /// Panics for in-memory stores, which do not survive a close.
    pub fn reopen(&mut self, collection: &str) {
        let path = self.path().expect("Only file stores can be reopened");
        self.handle.close().expect("Failed to close store");
        self.handle = Handle::open(
            Options::new()
                .file(path)
                .mode(Mode::File)
                .collection(collection)
                .auto_shrink_disabled(true),
        )
        .expect("Failed to reopen store");
    }

    /// The temporary directory of a file store.
    pub fn dir(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }
}

impl std::ops::Deref for TestStore {
    type Target = Handle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl std::ops::DerefMut for TestStore {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.handle
    }
}

/// Runs a test with a temporary in-memory store.
///
/// # Example
///
/// ```rust
/// use shelfdb_testkit::with_temp_store;
///
/// with_temp_store(|store| {
///     store.set_with_no_expiration("k", "v").unwrap();
///     assert_eq!(store.get("k").unwrap(), "v");
/// });
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&Handle) -> R,
{
    let store = TestStore::memory();
    f(&store.handle)
}

/// Runs a test with a temporary file-based store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&Handle, &Path) -> R,
{
    let store = TestStore::file();
    let path = store.path().expect("File store should have a path");
    f(&store.handle, &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a store holding `count` persistent keys `key-00000`...
    /// in the test collection.
    pub fn populated_store(count: usize) -> TestStore {
        let store = TestStore::memory();
        for i in 0..count {
            store
                .set_with_no_expiration(&format!("key-{i:05}"), &format!("value-{i}"))
                .expect("Failed to set key");
        }
        store
    }

    /// Creates a store with one key in each of `count` collections
    /// `collection_0`, `collection_1`...
    pub fn multi_collection_store(count: usize) -> (TestStore, Vec<String>) {
        let store = TestStore::memory();
        let mut collections = Vec::with_capacity(count);

        for i in 0..count {
            let name = format!("collection_{i}");
            store
                .set_to_collection_with_no_expiration(&name, "only", &i.to_string())
                .expect("Failed to set key");
            collections.push(name);
        }

        (store, collections)
    }
}
