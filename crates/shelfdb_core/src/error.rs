//! Error types for ShelfDB core.

use shelfdb_engine::EngineError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in ShelfDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The key does not exist in the collection or has expired.
    #[error("not found")]
    NotFound,

    /// The store could not be opened.
    #[error("failed to open store at {path}: {source}")]
    Open {
        /// Physical path that was opened.
        path: String,
        /// Underlying engine error.
        #[source]
        source: EngineError,
    },

    /// The engine configuration could not be applied.
    #[error("configuration failed: {source}")]
    Configuration {
        /// Underlying engine error.
        #[source]
        source: EngineError,
    },

    /// The handle was closed.
    #[error("handle is closed")]
    Closed,

    /// A persistence mode string was not recognized.
    #[error("invalid mode {mode:?}: expected \"memory\" or \"file\"")]
    InvalidMode {
        /// The rejected input.
        mode: String,
    },

    /// Any other engine failure, including aborted transactions.
    #[error("engine error: {0}")]
    Engine(#[source] EngineError),
}

impl CoreError {
    /// Creates an open error.
    pub fn open(path: impl Into<String>, source: EngineError) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(source: EngineError) -> Self {
        Self::Configuration { source }
    }

    /// Creates an invalid mode error.
    pub fn invalid_mode(mode: impl Into<String>) -> Self {
        Self::InvalidMode { mode: mode.into() }
    }

    /// Returns `true` for [`CoreError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<EngineError> for CoreError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound => Self::NotFound,
            other => Self::Engine(other),
        }
    }
}
