//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level storage backend for the ShelfDB log.
///
/// Storage backends are **opaque byte stores**. The engine appends framed log
/// records and replays them on open; backends never look inside.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `flush` hands appended data to the OS, `sync` makes it durable
/// - `rewrite` replaces the whole contents atomically: readers observe
///   either the old or the new bytes, never a mix
/// - Backends must be `Send + Sync`
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range extends beyond the current size or an
    /// I/O error occurs.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the storage.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Flushes pending writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size of the storage in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Truncates the storage to `new_size` bytes.
    ///
    /// Used to drop a torn tail left behind by a crash mid-append.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is greater than the current size or
    /// the truncation fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Atomically replaces the entire contents with `data`.
    ///
    /// Used when the engine shrinks its log down to the live entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the replacement cannot be written. On error the
    /// previous contents are left in place.
    fn rewrite(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Reads the whole storage into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined or the read fails.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        self.read_at(0, size as usize)
    }
}
