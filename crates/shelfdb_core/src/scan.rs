//! Prefix scans over a collection.

use crate::error::CoreResult;
use crate::handle::Handle;
use crate::key;

impl Handle {
    /// Logical keys of the bound collection in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Closed`] after [`Handle::close`].
    pub fn get_keys(&self) -> CoreResult<Vec<String>> {
        self.get_keys_from_collection(self.collection())
    }

    /// Logical keys of `collection` in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Closed`] after [`Handle::close`].
    pub fn get_keys_from_collection(&self, collection: &str) -> CoreResult<Vec<String>> {
        let pattern = key::prefix_pattern(collection);
        let keys = self.engine()?.view(|tx| {
            let mut keys = Vec::new();
            tx.ascend_keys(&pattern, |physical, _| {
                keys.push(key::decode(physical, collection.len()).to_string());
                true
            })?;
            Ok(keys)
        })?;

        tracing::trace!(collection, count = keys.len(), "listed keys");
        Ok(keys)
    }

    /// Deletes every entry of the bound collection for which `predicate`
    /// holds, in one transaction. Returns the number of deleted entries.
    ///
    /// The predicate sees the **physical** key (`collection:key`) and the
    /// value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Closed`] or the engine's error; a failed
    /// delete rolls back the whole operation.
    pub fn delete_where<F>(&self, predicate: F) -> CoreResult<usize>
    where
        F: FnMut(&str, &str) -> bool,
    {
        self.delete_where_from_collection(self.collection(), predicate)
    }

    /// Like [`Handle::delete_where`] for an explicit collection.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Closed`] or the engine's error; a failed
    /// delete rolls back the whole operation.
    pub fn delete_where_from_collection<F>(
        &self,
        collection: &str,
        mut predicate: F,
    ) -> CoreResult<usize>
    where
        F: FnMut(&str, &str) -> bool,
    {
        let pattern = key::prefix_pattern(collection);
        let deleted = self.engine()?.update(|tx| {
            // Collect first: the scan cannot mutate what it walks.
            let mut doomed = Vec::new();
            tx.ascend_keys(&pattern, |physical, value| {
                if predicate(physical, value) {
                    doomed.push(physical.to_string());
                }
                true
            })?;

            for physical in &doomed {
                tx.delete(physical)?;
            }
            Ok(doomed.len())
        })?;

        tracing::debug!(collection, deleted, "deleted matching entries");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use crate::{CoreError, Handle, Options};

    fn seeded() -> Handle {
        let handle = Handle::open(Options::new().collection("fruit")).unwrap();
        for (k, v) in [("pear", "green"), ("apple", "red"), ("cherry", "red")] {
            handle.set_with_no_expiration(k, v).unwrap();
        }
        handle
            .set_to_collection_with_no_expiration("veg", "beet", "red")
            .unwrap();
        handle
    }

    #[test]
    fn keys_are_sorted_and_stripped() {
        let handle = seeded();
        assert_eq!(handle.get_keys().unwrap(), vec!["apple", "cherry", "pear"]);
        assert_eq!(handle.get_keys_from_collection("veg").unwrap(), vec!["beet"]);
        assert!(handle.get_keys_from_collection("none").unwrap().is_empty());
    }

    #[test]
    fn delete_where_sees_physical_keys() {
        let handle = seeded();
        let mut seen = Vec::new();
        let deleted = handle
            .delete_where(|k, v| {
                seen.push(k.to_string());
                v == "red"
            })
            .unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(seen, vec!["fruit:apple", "fruit:cherry", "fruit:pear"]);
        assert_eq!(handle.get_keys().unwrap(), vec!["pear"]);
        // Other collections are untouched.
        assert_eq!(handle.get_from_collection("veg", "beet").unwrap(), "red");
    }

    #[test]
    fn delete_where_from_collection_with_no_match() {
        let handle = seeded();
        assert_eq!(
            handle
                .delete_where_from_collection("veg", |_, v| v == "blue")
                .unwrap(),
            0
        );
    }

    #[test]
    fn wildcard_collection_names_stay_isolated() {
        let handle = Handle::open(Options::new().collection("a?")).unwrap();
        handle
            .set_to_collection_with_no_expiration("ab", "victim", "v")
            .unwrap();
        handle
            .set_to_collection_with_no_expiration("*", "star", "v")
            .unwrap();
        handle.set_with_no_expiration("mine", "v").unwrap();

        assert_eq!(handle.get_keys().unwrap(), vec!["mine"]);
        assert_eq!(handle.get_keys_from_collection("*").unwrap(), vec!["star"]);
        assert_eq!(handle.delete_where(|_, _| true).unwrap(), 1);
        assert_eq!(handle.get_from_collection("ab", "victim").unwrap(), "v");
        assert_eq!(handle.get_from_collection("*", "star").unwrap(), "v");
    }

    #[test]
    fn scans_after_close_fail() {
        let mut handle = seeded();
        handle.close().unwrap();
        assert!(matches!(handle.get_keys(), Err(CoreError::Closed)));
        assert!(matches!(handle.delete_where(|_, _| true), Err(CoreError::Closed)));
    }
}
