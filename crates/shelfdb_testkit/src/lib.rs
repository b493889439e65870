//! # ShelfDB Testkit
//!
//! Test utilities for ShelfDB.
//!
//! This crate provides:
//! - Test fixtures and store helpers
//! - Property-based test generators and a reference model using proptest
//! - Crash recovery checks over cut logs
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust
//! use shelfdb_testkit::prelude::*;
//!
//! with_temp_store(|store| {
//!     store.set_with_no_expiration("k", "v").unwrap();
//!     assert_eq!(store.get_keys().unwrap(), ["k"]);
//! });
//! ```

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
