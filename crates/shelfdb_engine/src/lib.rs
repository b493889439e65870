//! # ShelfDB Engine
//!
//! Ordered, transactional key-value engine with per-key expiration.
//!
//! - Keys and values are strings, kept in key order
//! - Read-write transactions are serialized; read-only transactions run
//!   concurrently
//! - A failed read-write transaction leaves no trace
//! - File-backed stores persist through an append-only log that is replayed
//!   on open and shrunk in the background
//! - Expired entries are invisible immediately and removed by a background
//!   sweeper
//!
//! ```rust
//! use shelfdb_engine::{Engine, SetOptions};
//! use std::time::Duration;
//!
//! let engine = Engine::open(shelfdb_engine::MEMORY_PATH).unwrap();
//! engine
//!     .update(|tx| {
//!         tx.set("users:alice", "a1", SetOptions::persistent())?;
//!         tx.set("users:bob", "b1", SetOptions::expiring(Duration::from_secs(60)))?;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let mut keys = Vec::new();
//! engine
//!     .view(|tx| {
//!         tx.ascend_keys("users:*", |key, _| {
//!             keys.push(key.to_string());
//!             true
//!         })
//!     })
//!     .unwrap();
//! assert_eq!(keys, ["users:alice", "users:bob"]);
//! ```

mod config;
mod engine;
mod error;
mod lock;
pub mod log;
pub mod pattern;
mod state;
mod sweeper;
mod tx;

pub use config::{
    EngineConfig, OnExpired, OnExpiredSync, SyncPolicy, DEFAULT_AUTO_SHRINK_MIN_SIZE,
    DEFAULT_AUTO_SHRINK_PERCENTAGE, DEFAULT_SWEEP_INTERVAL,
};
pub use engine::{Engine, MEMORY_PATH};
pub use error::{EngineError, EngineResult};
pub use tx::{SetOptions, Tx};
