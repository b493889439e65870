//! Stress tests for ShelfDB.
//!
//! These tests verify behavior under heavy load and concurrent access
//! through a shared [`Handle`].

use shelfdb_core::Handle;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Operations: {} ({} failed)", self.total_ops, self.failed_ops);
        println!("Duration:   {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of concurrent threads (for concurrent tests).
    pub threads: usize,
    /// Size of values in bytes.
    pub value_size: usize,
    /// Number of distinct keys.
    pub key_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            value_size: 256,
            key_count: 1_000,
        }
    }
}

fn key_for(i: usize) -> String {
    format!("key-{i:06}")
}

/// Run a sequential write stress test.
pub fn stress_sequential_writes(handle: &Handle, config: &StressConfig) -> StressTestResult {
    let value = "x".repeat(config.value_size);

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        match handle.set_with_no_expiration(&key_for(i % config.key_count), &value) {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a mixed set/get/delete stress test.
///
/// Reads and deletes of keys that are absent count as successful.
pub fn stress_mixed_operations(handle: &Handle, config: &StressConfig) -> StressTestResult {
    let value = "x".repeat(config.value_size);
    let collection = handle.collection().to_string();

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let key = key_for(i % config.key_count);

        let result = match i % 3 {
            0 => handle.set_with_no_expiration(&key, &value),
            1 => handle.get(&key).map(|_| ()),
            _ => handle.delete_from_collection(&collection, &key),
        };

        match result {
            Ok(()) => successful += 1,
            Err(e) if e.is_not_found() => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a concurrent write stress test; each thread owns its own keys.
pub fn stress_concurrent_writes(handle: Arc<Handle>, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let ops_per_thread = config.operations / config.threads;
    let value = "x".repeat(config.value_size);

    let start = Instant::now();

    let workers: Vec<_> = (0..config.threads)
        .map(|t| {
            let handle = Arc::clone(&handle);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let value = value.clone();

            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    let key = format!("t{t}-{}", key_for(i));
                    match handle.set_with_no_expiration(&key, &value) {
                        Ok(()) => {
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Run a bulk delete against a collection of `config.key_count` keys,
/// half of which match.
pub fn stress_delete_where(handle: &Handle, config: &StressConfig) -> StressTestResult {
    for i in 0..config.key_count {
        let value = if i % 2 == 0 { "even" } else { "odd" };
        let _ = handle.set_with_no_expiration(&key_for(i), value);
    }

    let start = Instant::now();
    let (successful, failed) = match handle.delete_where(|_, v| v == "even") {
        Ok(deleted) => (deleted, config.key_count - deleted),
        Err(_) => (0, config.key_count),
    };

    StressTestResult::new(successful, failed, start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestStore;

    #[test]
    fn test_sequential_writes() {
        let store = TestStore::memory();
        let config = StressConfig {
            operations: 1_000,
            key_count: 100,
            value_size: 64,
            ..Default::default()
        };

        let result = stress_sequential_writes(&store, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, 1_000);
        assert_eq!(store.get_keys().unwrap().len(), 100);
    }

    #[test]
    fn test_mixed_operations() {
        let store = TestStore::file();
        let config = StressConfig {
            operations: 900,
            key_count: 50,
            value_size: 32,
            ..Default::default()
        };

        let result = stress_mixed_operations(&store, &config);
        assert_eq!(result.failed_ops, 0);
    }

    #[test]
    fn test_concurrent_writes() {
        let store = TestStore::memory();
        let handle = Arc::new(store.handle);
        let config = StressConfig {
            operations: 1_000,
            threads: 4,
            value_size: 16,
            key_count: 1_000,
        };

        let result = stress_concurrent_writes(Arc::clone(&handle), &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(handle.get_keys().unwrap().len(), 1_000);
    }

    #[test]
    fn test_delete_where() {
        let store = TestStore::memory();
        let config = StressConfig {
            key_count: 200,
            ..Default::default()
        };

        let result = stress_delete_where(&store, &config);
        assert_eq!(result.successful_ops, 100);
        assert_eq!(store.get_keys().unwrap().len(), 100);
    }
}
