//! Engine configuration.

use crate::error::{EngineError, EngineResult};
use crate::tx::Tx;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default auto-shrink growth percentage.
pub const DEFAULT_AUTO_SHRINK_PERCENTAGE: u32 = 100;

/// Default minimum log size before auto-shrink is considered (32 MiB).
pub const DEFAULT_AUTO_SHRINK_MIN_SIZE: u64 = 32 * 1024 * 1024;

/// Default interval between two sweeper passes.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Called by the sweeper with every key that expired during a pass.
///
/// When installed, the engine leaves the expired entries in place (they stay
/// invisible to reads) and the callback decides what to do with them.
pub type OnExpired = Arc<dyn Fn(&[String]) + Send + Sync>;

/// Called by the sweeper for each expired entry inside a read-write transaction.
///
/// The callback owns the entry's fate: it is expected to delete the key
/// through the transaction. Deleting an expired key reports
/// [`EngineError::NotFound`]; the sweeper treats that as success. Any other
/// error rolls back the whole pass. The callback must not start another
/// transaction on the same store.
pub type OnExpiredSync = Arc<dyn Fn(&str, &str, &mut Tx<'_>) -> EngineResult<()> + Send + Sync>;

/// How often committed data is synced to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// Never sync explicitly; leave it to the OS.
    #[default]
    Never,
    /// Sync from the sweeper roughly once per second when data is dirty.
    EverySecond,
    /// Sync after every committed read-write transaction.
    Always,
}

impl SyncPolicy {
    /// Returns the policy name used by [`FromStr`] and [`fmt::Display`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::EverySecond => "every-second",
            Self::Always => "always",
        }
    }
}

impl fmt::Display for SyncPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncPolicy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "never" => Ok(Self::Never),
            "every-second" | "everysecond" => Ok(Self::EverySecond),
            "always" => Ok(Self::Always),
            other => Err(EngineError::invalid_config(format!(
                "unknown sync policy {other:?}"
            ))),
        }
    }
}

/// Runtime configuration of an open store.
///
/// Read it with [`crate::Engine::read_config`], change what you need and
/// write it back with [`crate::Engine::set_config`].
#[derive(Clone)]
pub struct EngineConfig {
    /// Durability policy for committed transactions.
    pub sync_policy: SyncPolicy,

    /// Disables automatic log shrinking.
    pub auto_shrink_disabled: bool,

    /// Growth (in percent of the size after the last shrink or load) that
    /// triggers an automatic shrink.
    pub auto_shrink_percentage: u32,

    /// Minimum log size in bytes before an automatic shrink is considered.
    pub auto_shrink_min_size: u64,

    /// Expiration notification hook.
    pub on_expired: Option<OnExpired>,

    /// Synchronous expiration hook with transaction access.
    pub on_expired_sync: Option<OnExpiredSync>,

    /// Interval between two sweeper passes.
    pub sweep_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sync_policy: SyncPolicy::EverySecond,
            auto_shrink_disabled: false,
            auto_shrink_percentage: DEFAULT_AUTO_SHRINK_PERCENTAGE,
            auto_shrink_min_size: DEFAULT_AUTO_SHRINK_MIN_SIZE,
            on_expired: None,
            on_expired_sync: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sync policy.
    #[must_use]
    pub fn sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.sync_policy = policy;
        self
    }

    /// Enables or disables automatic shrinking.
    #[must_use]
    pub fn auto_shrink_disabled(mut self, disabled: bool) -> Self {
        self.auto_shrink_disabled = disabled;
        self
    }

    /// Sets the auto-shrink growth percentage.
    #[must_use]
    pub fn auto_shrink_percentage(mut self, percentage: u32) -> Self {
        self.auto_shrink_percentage = percentage;
        self
    }

    /// Sets the auto-shrink minimum log size.
    #[must_use]
    pub fn auto_shrink_min_size(mut self, size: u64) -> Self {
        self.auto_shrink_min_size = size;
        self
    }

    /// Sets the sweeper interval.
    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Checks the configuration for values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] for a zero sweep interval.
    pub fn validate(&self) -> EngineResult<()> {
        if self.sweep_interval.is_zero() {
            return Err(EngineError::invalid_config("sweep interval must be non-zero"));
        }
        Ok(())
    }

    /// Returns `true` when the log should be rewritten.
    ///
    /// `base_size` is the log size right after the last load or shrink.
    #[must_use]
    pub fn wants_shrink(&self, log_size: u64, base_size: u64) -> bool {
        if self.auto_shrink_disabled || log_size < self.auto_shrink_min_size {
            return false;
        }
        let growth = base_size.saturating_mul(u64::from(self.auto_shrink_percentage)) / 100;
        log_size > base_size.saturating_add(growth)
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("sync_policy", &self.sync_policy)
            .field("auto_shrink_disabled", &self.auto_shrink_disabled)
            .field("auto_shrink_percentage", &self.auto_shrink_percentage)
            .field("auto_shrink_min_size", &self.auto_shrink_min_size)
            .field("on_expired", &self.on_expired.is_some())
            .field("on_expired_sync", &self.on_expired_sync.is_some())
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}
