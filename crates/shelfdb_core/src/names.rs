//! Generation of unique store file names.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time.
pub trait Clock {
    /// Returns the current time.
    fn now(&self) -> SystemTime;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Builds names of the form `{label}{unix_seconds}-{random}.db`.
///
/// The generator owns its clock and random source, so tests can pin both.
///
/// ```rust
/// use shelfdb_core::NameGenerator;
///
/// let mut names = NameGenerator::new("cache-");
/// let name = names.next_name();
/// assert!(name.starts_with("cache-"));
/// assert!(name.ends_with(".db"));
/// ```
#[derive(Debug)]
pub struct NameGenerator<C = SystemClock, R = StdRng> {
    label: String,
    clock: C,
    rng: R,
}

impl NameGenerator {
    /// Creates a generator using the system clock and an entropy-seeded RNG.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_sources(label, SystemClock, StdRng::from_entropy())
    }
}

impl<C: Clock, R: RngCore> NameGenerator<C, R> {
    /// Creates a generator from explicit time and random sources.
    pub fn with_sources(label: impl Into<String>, clock: C, rng: R) -> Self {
        Self {
            label: label.into(),
            clock,
            rng,
        }
    }

    /// Returns the next file name.
    pub fn next_name(&mut self) -> String {
        let secs = self
            .clock
            .now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        format!("{}{secs}-{:08x}.db", self.label, self.rng.next_u32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct FixedClock(u64);

    impl Clock for FixedClock {
        fn now(&self) -> SystemTime {
            UNIX_EPOCH + Duration::from_secs(self.0)
        }
    }

    #[test]
    fn deterministic_with_fixed_sources() {
        let mut a = NameGenerator::with_sources("t-", FixedClock(1_700_000_000), StdRng::seed_from_u64(7));
        let mut b = NameGenerator::with_sources("t-", FixedClock(1_700_000_000), StdRng::seed_from_u64(7));

        let first = a.next_name();
        assert_eq!(first, b.next_name());
        assert!(first.starts_with("t-1700000000-"));
        assert_eq!(first.len(), "t-1700000000-".len() + 8 + ".db".len());
    }

    #[test]
    fn successive_names_differ() {
        let mut names = NameGenerator::with_sources("", FixedClock(0), StdRng::seed_from_u64(1));
        assert_ne!(names.next_name(), names.next_name());
    }
}
