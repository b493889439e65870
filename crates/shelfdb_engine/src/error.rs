//! Error types for the ShelfDB engine.

use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] shelfdb_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The key does not exist or has expired.
    #[error("not found")]
    NotFound,

    /// A mutation was attempted inside a read-only transaction.
    #[error("transaction is not writable")]
    TxNotWritable,

    /// Another process holds the store's lock.
    #[error("database locked: {path} is held by another process")]
    DatabaseLocked {
        /// Path of the locked store.
        path: String,
    },

    /// The log is corrupted or invalid.
    #[error("log corruption: {message}")]
    LogCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// A failed append could not be removed from the log; further appends
    /// are refused until the store is reloaded or shrunk.
    #[error("log refuses writes: a failed batch at offset {offset} could not be removed")]
    LogPoisoned {
        /// Offset where the failed batch starts.
        offset: u64,
    },

    /// Checksum mismatch detected while replaying the log.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// A configuration value was rejected.
    #[error("invalid config: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// The transaction body asked for a rollback.
    #[error("transaction aborted: {reason}")]
    TransactionAborted {
        /// Reason for abort.
        reason: String,
    },
}

impl EngineError {
    /// Creates a log corruption error.
    pub fn log_corruption(message: impl Into<String>) -> Self {
        Self::LogCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a transaction aborted error.
    pub fn transaction_aborted(reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// Returns `true` for [`EngineError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
