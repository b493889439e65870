//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants, plus a reference model
//! to check a handle against.

use proptest::prelude::*;
use shelfdb_core::{key, CoreResult, Handle};
use std::collections::BTreeMap;

/// Strategy for generating valid collection names.
///
/// Names never contain the separator or glob characters, so no two
/// generated collections overlap.
pub fn collection_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,11}").expect("Invalid regex")
}

/// Strategy for generating logical keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_.:-]{0,16}").expect("Invalid regex")
}

/// Strategy for generating values, including empty and non-ASCII ones.
pub fn value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => prop::string::string_regex("[a-z0-9]{0,32}").expect("Invalid regex"),
        1 => any::<String>(),
    ]
}

/// A single operation against a handle.
#[derive(Debug, Clone)]
pub enum StoreOperation {
    /// Store a persistent value.
    Set {
        /// Collection
        collection: String,
        /// Logical key
        key: String,
        /// Value
        value: String,
    },
    /// Delete a key through the collection path.
    Delete {
        /// Collection
        collection: String,
        /// Logical key
        key: String,
    },
    /// Read a key.
    Get {
        /// Collection
        collection: String,
        /// Logical key
        key: String,
    },
    /// Delete every entry of a collection whose value starts with `prefix`.
    DeleteWhere {
        /// Collection
        collection: String,
        /// Value prefix
        prefix: String,
    },
}

/// Strategy for generating operations over a small pool of collections,
/// so that operations collide often.
pub fn store_operation_strategy() -> impl Strategy<Value = StoreOperation> {
    let collection = prop::sample::select(vec!["a", "b", "ab"]).prop_map(String::from);
    let key = prop::sample::select(vec!["k1", "k2", "k3", "x:y"]).prop_map(String::from);

    prop_oneof![
        4 => (collection.clone(), key.clone(), value_strategy())
            .prop_map(|(collection, key, value)| StoreOperation::Set { collection, key, value }),
        2 => (collection.clone(), key.clone())
            .prop_map(|(collection, key)| StoreOperation::Delete { collection, key }),
        2 => (collection.clone(), key)
            .prop_map(|(collection, key)| StoreOperation::Get { collection, key }),
        1 => (collection, prop::string::string_regex("[a-z0-9]{0,2}").expect("Invalid regex"))
            .prop_map(|(collection, prefix)| StoreOperation::DeleteWhere { collection, prefix }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<StoreOperation>> {
    prop::collection::vec(store_operation_strategy(), min_ops..max_ops)
}

/// Reference model of a store without expiration: a sorted map from
/// physical key to value.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Model {
    entries: BTreeMap<String, String>,
}

impl Model {
    /// Creates an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `op` to the model and returns what a read observed, if the
    /// operation is a read, or the deletion count of a bulk delete.
    pub fn apply(&mut self, op: &StoreOperation) -> Observation {
        match op {
            StoreOperation::Set { collection, key, value } => {
                self.entries.insert(key::encode(collection, key), value.clone());
                Observation::None
            }
            StoreOperation::Delete { collection, key } => {
                self.entries.remove(&key::encode(collection, key));
                Observation::None
            }
            StoreOperation::Get { collection, key } => {
                Observation::Value(self.entries.get(&key::encode(collection, key)).cloned())
            }
            StoreOperation::DeleteWhere { collection, prefix } => {
                let doomed: Vec<String> = self
                    .keys(collection)
                    .into_iter()
                    .map(|k| key::encode(collection, &k))
                    .filter(|physical| self.entries[physical].starts_with(prefix.as_str()))
                    .collect();
                for physical in &doomed {
                    self.entries.remove(physical);
                }
                Observation::Deleted(doomed.len())
            }
        }
    }

    /// Logical keys of `collection` in the order a prefix scan yields them.
    #[must_use]
    pub fn keys(&self, collection: &str) -> Vec<String> {
        let prefix = key::encode(collection, "");
        self.entries
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| key::decode(k, collection.len()).to_string())
            .collect()
    }
}

/// What an operation observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Nothing to observe.
    None,
    /// Result of a read; `None` when the key was not found.
    Value(Option<String>),
    /// Number of entries a bulk delete removed.
    Deleted(usize),
}

/// Applies `op` to a real handle and reports the same kind of
/// observation as [`Model::apply`].
///
/// # Errors
///
/// Returns any error other than a not-found read.
pub fn apply_to_handle(handle: &Handle, op: &StoreOperation) -> CoreResult<Observation> {
    match op {
        StoreOperation::Set { collection, key, value } => {
            handle.set_to_collection_with_no_expiration(collection, key, value)?;
            Ok(Observation::None)
        }
        StoreOperation::Delete { collection, key } => {
            handle.delete_from_collection(collection, key)?;
            Ok(Observation::None)
        }
        StoreOperation::Get { collection, key } => match handle.get_from_collection(collection, key) {
            Ok(value) => Ok(Observation::Value(Some(value))),
            Err(e) if e.is_not_found() => Ok(Observation::Value(None)),
            Err(e) => Err(e),
        },
        StoreOperation::DeleteWhere { collection, prefix } => {
            let deleted =
                handle.delete_where_from_collection(collection, |_, v| v.starts_with(prefix.as_str()))?;
            Ok(Observation::Deleted(deleted))
        }
    }
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
