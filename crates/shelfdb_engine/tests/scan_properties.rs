//! Property tests for glob matching and ordered scans.

use proptest::prelude::*;
use shelfdb_engine::{pattern, Engine, SetOptions};
use std::collections::BTreeSet;

fn literal() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-c:]{0,6}").unwrap()
}

proptest! {
    #[test]
    fn literal_pattern_matches_only_itself(key in literal(), other in literal()) {
        prop_assert!(pattern::matches(&key, &key));
        prop_assert_eq!(pattern::matches(&other, &key), other == key);
    }

    #[test]
    fn trailing_star_is_a_prefix_test(prefix in literal(), key in literal()) {
        let glob = format!("{prefix}*");
        prop_assert_eq!(pattern::matches(&key, &glob), key.starts_with(&prefix));
        prop_assert_eq!(pattern::literal_prefix(&glob), prefix.as_str());
    }

    #[test]
    fn question_mark_matches_one_char(key in literal()) {
        let glob: String = key.chars().map(|_| '?').collect();
        prop_assert!(pattern::matches(&key, &glob));
        let longer = format!("{}x", key);
        prop_assert!(!pattern::matches(&longer, &glob));
    }

    #[test]
    fn ascend_keys_yields_sorted_prefix_matches(
        keys in prop::collection::btree_set(literal(), 0..24),
        prefix in literal(),
    ) {
        let engine = Engine::open_in_memory().unwrap();
        engine
            .update(|tx| {
                for key in &keys {
                    tx.set(key, "v", SetOptions::persistent())?;
                }
                Ok(())
            })
            .unwrap();

        let mut seen = Vec::new();
        engine
            .view(|tx| {
                tx.ascend_keys(&format!("{prefix}*"), |k, _| {
                    seen.push(k.to_string());
                    true
                })
            })
            .unwrap();

        let expected: Vec<String> = keys
            .iter()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        prop_assert_eq!(seen, expected);
    }
}

#[test]
fn ascend_keys_stops_when_asked() {
    let engine = Engine::open_in_memory().unwrap();
    let keys: BTreeSet<&str> = ["a:1", "a:2", "a:3"].into_iter().collect();
    engine
        .update(|tx| {
            for key in &keys {
                tx.set(key, "v", SetOptions::persistent())?;
            }
            Ok(())
        })
        .unwrap();

    let mut seen = 0;
    engine
        .view(|tx| {
            tx.ascend_keys("a:*", |_, _| {
                seen += 1;
                seen < 2
            })
        })
        .unwrap();
    assert_eq!(seen, 2);
}
