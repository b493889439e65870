//! Benchmark utilities.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Generate a random alphanumeric value of the specified length.
pub fn random_value(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate `count` ordered keys with random values of `value_len` bytes.
pub fn generate_entries(count: usize, value_len: usize) -> Vec<(String, String)> {
    (0..count)
        .map(|i| (format!("key-{i:08}"), random_value(value_len)))
        .collect()
}
