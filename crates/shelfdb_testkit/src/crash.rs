//! Crash recovery testing for ShelfDB.
//!
//! A crash can cut the log anywhere. The harness writes a series of
//! committed operations to a file store, remembers the log size and the
//! visible contents after each one, then replays copies of the log cut at
//! arbitrary offsets. A cut log must reopen to exactly the state of the
//! last operation that fully fit before the cut.
//!
//! ## Usage
//!
//! ```rust
//! use shelfdb_testkit::crash::CrashHarness;
//!
//! let mut harness = CrashHarness::new();
//! harness.set("a", "1");
//! harness.set("b", "2");
//! harness.delete("a");
//!
//! for result in harness.check_every_cut() {
//!     assert!(result.passed, "{result:?}");
//! }
//! ```

use crate::fixtures::TEST_COLLECTION;
use shelfdb_core::{Handle, Mode, NameGenerator, Options};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Visible contents of the test collection.
pub type Snapshot = BTreeMap<String, String>;

/// Result of replaying one cut log.
#[derive(Debug, Clone)]
pub struct CrashRecoveryResult {
    /// Whether the recovered state matched.
    pub passed: bool,
    /// Log offset at which the copy was cut.
    pub cut_at: u64,
    /// Expected contents after recovery.
    pub expected: Snapshot,
    /// Recovered contents.
    pub actual: Snapshot,
    /// Any error message.
    pub error: Option<String>,
}

/// Writes operations and checks recovery from every prefix of the log.
pub struct CrashHarness {
    dir: TempDir,
    names: NameGenerator,
    handle: Handle,
    /// `(log size, contents)` after every operation, starting empty.
    checkpoints: Vec<(u64, Snapshot)>,
}

impl CrashHarness {
    /// Creates a harness over a fresh file store.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let mut names = NameGenerator::new("crash-");
        let handle = open(&dir.path().join(names.next_name()));

        let mut harness = Self {
            dir,
            names,
            handle,
            checkpoints: Vec::new(),
        };
        harness.checkpoint();
        harness
    }

    /// Stores a persistent value in the test collection.
    pub fn set(&mut self, key: &str, value: &str) {
        self.handle
            .set_with_no_expiration(key, value)
            .expect("Failed to set key");
        self.checkpoint();
    }

    /// Deletes a key from the test collection if present.
    pub fn delete(&mut self, key: &str) {
        self.handle
            .delete_from_collection(TEST_COLLECTION, key)
            .expect("Failed to delete key");
        self.checkpoint();
    }

    /// Deletes every entry whose value starts with `prefix`.
    pub fn delete_where_value_starts_with(&mut self, prefix: &str) {
        self.handle
            .delete_where(|_, v| v.starts_with(prefix))
            .expect("Failed to delete entries");
        self.checkpoint();
    }

    /// Total bytes written to the log so far.
    pub fn log_size(&self) -> u64 {
        self.checkpoints.last().map_or(0, |(size, _)| *size)
    }

    /// Replays a copy of the log cut at `cut_at` bytes.
    pub fn check_cut(&mut self, cut_at: u64) -> CrashRecoveryResult {
        let expected = self
            .checkpoints
            .iter()
            .rev()
            .find(|(size, _)| *size <= cut_at)
            .map(|(_, snapshot)| snapshot.clone())
            .unwrap_or_default();

        let outcome = self.replay(cut_at);
        match outcome {
            Ok(actual) => CrashRecoveryResult {
                passed: actual == expected,
                cut_at,
                expected,
                actual,
                error: None,
            },
            Err(e) => CrashRecoveryResult {
                passed: false,
                cut_at,
                expected,
                actual: Snapshot::new(),
                error: Some(e.to_string()),
            },
        }
    }

    /// Replays a cut at every offset of the log.
    pub fn check_every_cut(&mut self) -> Vec<CrashRecoveryResult> {
        (0..=self.log_size()).map(|cut| self.check_cut(cut)).collect()
    }

    fn checkpoint(&mut self) {
        let size = self
            .handle
            .log_size()
            .expect("Failed to read log size")
            .unwrap_or(0);
        let snapshot = snapshot(&self.handle).expect("Failed to read store");
        self.checkpoints.push((size, snapshot));
    }

    fn replay(&mut self, cut_at: u64) -> Result<Snapshot, Box<dyn std::error::Error>> {
        let bytes = fs::read(self.handle.file())?;
        let cut = usize::try_from(cut_at)?.min(bytes.len());

        let path = self.dir.path().join(self.names.next_name());
        fs::write(&path, &bytes[..cut])?;

        let mut handle = Handle::open(options(&path))?;
        let contents = snapshot(&handle)?;
        handle.close()?;
        fs::remove_file(&path)?;
        Ok(contents)
    }
}

impl Default for CrashHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn options(path: &Path) -> Options {
    Options::new()
        .file(PathBuf::from(path))
        .mode(Mode::File)
        .collection(TEST_COLLECTION)
        .auto_shrink_disabled(true)
}

fn open(path: &Path) -> Handle {
    Handle::open(options(path)).expect("Failed to open store")
}

/// Reads the visible contents of the handle's bound collection.
///
/// # Errors
///
/// Returns the handle's error if a scan or read fails.
pub fn snapshot(handle: &Handle) -> shelfdb_core::CoreResult<Snapshot> {
    let mut contents = Snapshot::new();
    for key in handle.get_keys()? {
        let value = handle.get(&key)?;
        contents.insert(key, value);
    }
    Ok(contents)
}
