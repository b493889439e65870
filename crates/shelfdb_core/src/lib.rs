//! # ShelfDB Core
//!
//! Collection-scoped key-value storage with per-key expiration.
//!
//! Many logical collections share one physical store: the entry `key` of
//! collection `users` is stored under the physical key `users:key`. A
//! [`Handle`] binds a default collection and offers set/get/delete with
//! optional TTL, key listing and predicate-based bulk deletion. Each call
//! is one atomic engine transaction.
//!
//! ```rust
//! use shelfdb_core::{Handle, Mode, Options};
//! use std::time::Duration;
//!
//! let handle = Handle::open(Options::new().mode(Mode::Memory).collection("users")).unwrap();
//! handle.set("alice", "a1", Duration::from_secs(10)).unwrap();
//! handle.set_with_no_expiration("bob", "b1").unwrap();
//!
//! assert_eq!(handle.get_keys().unwrap(), ["alice", "bob"]);
//! assert_eq!(handle.delete_where(|_, value| value == "b1").unwrap(), 1);
//! ```

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod error;
mod handle;
pub mod key;
mod names;
mod options;
mod scan;

pub use error::{CoreError, CoreResult};
pub use handle::Handle;
pub use names::{Clock, NameGenerator, SystemClock};
pub use options::{
    merge, Mode, Options, ResolvedConfig, DEFAULT_COLLECTION, DEFAULT_FILE,
    FALLBACK_SHRINK_MIN_SIZE, FALLBACK_SHRINK_PERCENTAGE,
};
pub use shelfdb_engine::{OnExpired, OnExpiredSync, SyncPolicy, Tx};
