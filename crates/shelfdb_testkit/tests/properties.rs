//! Property tests: a handle behaves like the sorted-map model.

use proptest::prelude::*;
use shelfdb_testkit::prelude::*;
use std::time::Duration;

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn set_then_get_round_trips(
        collection in collection_name_strategy(),
        key in key_strategy(),
        value in value_strategy(),
        ttl_secs in 1u64..3600,
    ) {
        let store = TestStore::memory();
        store
            .set_to_collection(&collection, &key, &value, Duration::from_secs(ttl_secs))
            .unwrap();
        prop_assert_eq!(store.get_from_collection(&collection, &key).unwrap(), value);
    }

    #[test]
    fn collections_with_the_same_key_are_independent(
        c1 in collection_name_strategy(),
        c2 in collection_name_strategy(),
        key in key_strategy(),
    ) {
        prop_assume!(c1 != c2);
        let store = TestStore::memory();
        store.set_to_collection_with_no_expiration(&c1, &key, "a").unwrap();
        store.set_to_collection_with_no_expiration(&c2, &key, "b").unwrap();

        prop_assert_eq!(store.get_from_collection(&c1, &key).unwrap(), "a");
        prop_assert_eq!(store.get_from_collection(&c2, &key).unwrap(), "b");
    }

    #[test]
    fn handle_matches_model(ops in operation_sequence_strategy(1, 64)) {
        let store = TestStore::memory();
        let mut model = Model::new();

        for op in &ops {
            let expected = model.apply(op);
            let actual = apply_to_handle(&store, op).unwrap();
            prop_assert_eq!(actual, expected, "diverged at {:?}", op);
        }

        for collection in ["a", "b", "ab"] {
            prop_assert_eq!(store.get_keys_from_collection(collection).unwrap(), model.keys(collection));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 8, ..ProptestConfig::default() })]

    #[test]
    fn file_store_reloads_model_state(ops in operation_sequence_strategy(1, 32)) {
        let mut store = TestStore::file();
        let mut model = Model::new();
        for op in &ops {
            model.apply(op);
            apply_to_handle(&store, op).unwrap();
        }

        store.reopen("a");
        for collection in ["a", "b", "ab"] {
            prop_assert_eq!(store.get_keys_from_collection(collection).unwrap(), model.keys(collection));
        }
    }
}

#[test]
fn every_cut_of_a_mixed_log_recovers() {
    let mut harness = CrashHarness::new();
    for i in 0..5 {
        harness.set(&format!("k{i}"), &format!("v{i}"));
    }
    harness.delete("k2");
    harness.delete_where_value_starts_with("v4");
    harness.set("k0", "again");

    for result in harness.check_every_cut() {
        assert!(result.passed, "{result:?}");
    }
}
