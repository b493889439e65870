//! # ShelfDB Storage
//!
//! Byte-level storage backends for the ShelfDB engine.
//!
//! Backends are **opaque byte stores**. The engine writes its append-only
//! log through them and owns all interpretation of the bytes.
//!
//! ## Design Principles
//!
//! - Backends only read, append, flush and rewrite bytes
//! - No knowledge of log records, keys or expiration
//! - Must be `Send + Sync` so a store can be shared by several handles
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and ephemeral stores
//! - [`FileBackend`] - For durable stores using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use shelfdb_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
