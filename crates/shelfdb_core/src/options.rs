//! Handle options and their resolution into an engine configuration.

use crate::error::CoreError;
use shelfdb_engine::{EngineConfig, OnExpired, OnExpiredSync, SyncPolicy, MEMORY_PATH};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File used when none is given.
pub const DEFAULT_FILE: &str = "data.db";

/// Collection bound when none is given.
pub const DEFAULT_COLLECTION: &str = "data";

/// Auto-shrink percentage used when the options leave it at zero.
pub const FALLBACK_SHRINK_PERCENTAGE: u32 = 100;

/// Auto-shrink minimum size used when the options leave it at zero.
pub const FALLBACK_SHRINK_MIN_SIZE: u64 = 32;

/// Where a handle keeps its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Nothing is written to disk; the file option is ignored.
    #[default]
    Memory,
    /// Entries persist in the configured file.
    File,
}

impl Mode {
    /// Canonical name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File => "file",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "file" | "disk" => Ok(Self::File),
            _ => Err(CoreError::invalid_mode(s)),
        }
    }
}

/// Options for [`crate::Handle::open`] and [`crate::Handle::init`].
///
/// Every field is optional. Unset fields take their value from the layer
/// underneath when options are [merged](Options::merge), and from the
/// resolution rules of [`merge`] at the bottom.
///
/// `file` and `mode` only matter when opening; [`crate::Handle::init`]
/// ignores them.
#[derive(Clone, Default)]
pub struct Options {
    /// Path of the store file.
    pub file: Option<PathBuf>,
    /// Collection to bind.
    pub collection: Option<String>,
    /// Persistence mode.
    pub mode: Option<Mode>,
    /// Durability policy.
    pub sync_policy: Option<SyncPolicy>,
    /// Disables automatic log shrinking.
    pub auto_shrink_disabled: Option<bool>,
    /// Log growth in percent that triggers a shrink; zero means default.
    pub auto_shrink_percentage: Option<u32>,
    /// Minimum log size in bytes for a shrink; zero means default.
    pub auto_shrink_min_size: Option<u64>,
    /// Expiration notification hook.
    pub on_expired: Option<OnExpired>,
    /// Expiration hook with transaction access.
    pub on_expired_sync: Option<OnExpiredSync>,
}

impl Options {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The base layer used when opening a handle.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            file: Some(PathBuf::from(DEFAULT_FILE)),
            collection: Some(DEFAULT_COLLECTION.to_string()),
            mode: Some(Mode::Memory),
            sync_policy: Some(SyncPolicy::EverySecond),
            ..Self::default()
        }
    }

    /// Sets the store file.
    #[must_use]
    pub fn file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Sets the collection to bind.
    #[must_use]
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Sets the persistence mode.
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Sets the sync policy.
    #[must_use]
    pub fn sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.sync_policy = Some(policy);
        self
    }

    /// Enables or disables automatic shrinking.
    #[must_use]
    pub fn auto_shrink_disabled(mut self, disabled: bool) -> Self {
        self.auto_shrink_disabled = Some(disabled);
        self
    }

    /// Sets the auto-shrink percentage.
    #[must_use]
    pub fn auto_shrink_percentage(mut self, percentage: u32) -> Self {
        self.auto_shrink_percentage = Some(percentage);
        self
    }

    /// Sets the auto-shrink minimum size in bytes.
    #[must_use]
    pub fn auto_shrink_min_size(mut self, size: u64) -> Self {
        self.auto_shrink_min_size = Some(size);
        self
    }

    /// Installs the expiration notification hook.
    #[must_use]
    pub fn on_expired(mut self, hook: OnExpired) -> Self {
        self.on_expired = Some(hook);
        self
    }

    /// Installs the transactional expiration hook.
    #[must_use]
    pub fn on_expired_sync(mut self, hook: OnExpiredSync) -> Self {
        self.on_expired_sync = Some(hook);
        self
    }

    /// Layers `overrides` on top of `self`: every field set in `overrides`
    /// wins.
    #[must_use]
    pub fn merge(self, overrides: Options) -> Self {
        Self {
            file: overrides.file.or(self.file),
            collection: overrides.collection.or(self.collection),
            mode: overrides.mode.or(self.mode),
            sync_policy: overrides.sync_policy.or(self.sync_policy),
            auto_shrink_disabled: overrides.auto_shrink_disabled.or(self.auto_shrink_disabled),
            auto_shrink_percentage: overrides
                .auto_shrink_percentage
                .or(self.auto_shrink_percentage),
            auto_shrink_min_size: overrides.auto_shrink_min_size.or(self.auto_shrink_min_size),
            on_expired: overrides.on_expired.or(self.on_expired),
            on_expired_sync: overrides.on_expired_sync.or(self.on_expired_sync),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("file", &self.file)
            .field("collection", &self.collection)
            .field("mode", &self.mode)
            .field("sync_policy", &self.sync_policy)
            .field("auto_shrink_disabled", &self.auto_shrink_disabled)
            .field("auto_shrink_percentage", &self.auto_shrink_percentage)
            .field("auto_shrink_min_size", &self.auto_shrink_min_size)
            .field("on_expired", &self.on_expired.is_some())
            .field("on_expired_sync", &self.on_expired_sync.is_some())
            .finish()
    }
}

/// Outcome of [`merge`]: everything a handle needs to open or reconfigure.
#[derive(Clone)]
pub struct ResolvedConfig {
    /// Physical path handed to the engine; [`MEMORY_PATH`] in memory mode.
    pub file: PathBuf,
    /// Persistence mode.
    pub mode: Mode,
    /// Collection to bind, if one was given.
    pub collection: Option<String>,
    /// Durability policy.
    pub sync_policy: SyncPolicy,
    /// Disables automatic log shrinking.
    pub auto_shrink_disabled: bool,
    /// Auto-shrink percentage, never zero.
    pub auto_shrink_percentage: u32,
    /// Auto-shrink minimum size, never zero.
    pub auto_shrink_min_size: u64,
    /// Expiration notification hook.
    pub on_expired: Option<OnExpired>,
    /// Expiration hook with transaction access.
    pub on_expired_sync: Option<OnExpiredSync>,
}

impl ResolvedConfig {
    /// Overwrites the fields this layer manages, keeping the rest of
    /// `current` (such as the sweep interval) as the engine had it.
    #[must_use]
    pub fn apply_to(&self, current: EngineConfig) -> EngineConfig {
        EngineConfig {
            sync_policy: self.sync_policy,
            auto_shrink_disabled: self.auto_shrink_disabled,
            auto_shrink_percentage: self.auto_shrink_percentage,
            auto_shrink_min_size: self.auto_shrink_min_size,
            on_expired: self.on_expired.clone(),
            on_expired_sync: self.on_expired_sync.clone(),
            ..current
        }
    }

    /// Returns `true` if the store lives only in memory.
    #[must_use]
    pub fn is_memory(&self) -> bool {
        self.file == Path::new(MEMORY_PATH)
    }
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("file", &self.file)
            .field("mode", &self.mode)
            .field("collection", &self.collection)
            .field("sync_policy", &self.sync_policy)
            .field("auto_shrink_disabled", &self.auto_shrink_disabled)
            .field("auto_shrink_percentage", &self.auto_shrink_percentage)
            .field("auto_shrink_min_size", &self.auto_shrink_min_size)
            .field("on_expired", &self.on_expired.is_some())
            .field("on_expired_sync", &self.on_expired_sync.is_some())
            .finish()
    }
}

/// Resolves `overrides` layered on `defaults`.
///
/// Unset values fall back to their zero value, except the auto-shrink
/// percentage and minimum size which fall back to 100 and 32 when zero.
/// Memory mode forces the physical path to [`MEMORY_PATH`].
#[must_use]
pub fn merge(defaults: &Options, overrides: &Options) -> ResolvedConfig {
    let merged = defaults.clone().merge(overrides.clone());

    let mode = merged.mode.unwrap_or_default();
    let file = match mode {
        Mode::Memory => PathBuf::from(MEMORY_PATH),
        Mode::File => merged.file.unwrap_or_else(|| PathBuf::from(DEFAULT_FILE)),
    };

    ResolvedConfig {
        file,
        mode,
        collection: merged.collection,
        sync_policy: merged.sync_policy.unwrap_or_default(),
        auto_shrink_disabled: merged.auto_shrink_disabled.unwrap_or_default(),
        auto_shrink_percentage: merged
            .auto_shrink_percentage
            .filter(|p| *p != 0)
            .unwrap_or(FALLBACK_SHRINK_PERCENTAGE),
        auto_shrink_min_size: merged
            .auto_shrink_min_size
            .filter(|s| *s != 0)
            .unwrap_or(FALLBACK_SHRINK_MIN_SIZE),
        on_expired: merged.on_expired,
        on_expired_sync: merged.on_expired_sync,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn open_defaults() {
        let resolved = merge(&Options::defaults(), &Options::new());

        assert_eq!(resolved.mode, Mode::Memory);
        assert_eq!(resolved.file, PathBuf::from(MEMORY_PATH));
        assert!(resolved.is_memory());
        assert_eq!(resolved.collection.as_deref(), Some("data"));
        assert_eq!(resolved.sync_policy, SyncPolicy::EverySecond);
        assert_eq!(resolved.auto_shrink_percentage, 100);
        assert_eq!(resolved.auto_shrink_min_size, 32);
        assert!(!resolved.auto_shrink_disabled);
    }

    #[test]
    fn init_base_resets_to_zero_values() {
        let resolved = merge(&Options::default(), &Options::new());

        assert_eq!(resolved.collection, None);
        assert_eq!(resolved.sync_policy, SyncPolicy::Never);
        assert_eq!(resolved.auto_shrink_percentage, 100);
        assert_eq!(resolved.auto_shrink_min_size, 32);
        assert!(resolved.on_expired.is_none());
        assert!(resolved.on_expired_sync.is_none());
    }

    #[test]
    fn overrides_win() {
        let overrides = Options::new()
            .file("users.db")
            .mode(Mode::File)
            .collection("users")
            .sync_policy(SyncPolicy::Always)
            .auto_shrink_disabled(true)
            .auto_shrink_percentage(30)
            .auto_shrink_min_size(4096);
        let resolved = merge(&Options::defaults(), &overrides);

        assert_eq!(resolved.file, PathBuf::from("users.db"));
        assert_eq!(resolved.mode, Mode::File);
        assert!(!resolved.is_memory());
        assert_eq!(resolved.collection.as_deref(), Some("users"));
        assert_eq!(resolved.sync_policy, SyncPolicy::Always);
        assert!(resolved.auto_shrink_disabled);
        assert_eq!(resolved.auto_shrink_percentage, 30);
        assert_eq!(resolved.auto_shrink_min_size, 4096);
    }

    #[test]
    fn zero_shrink_settings_fall_back() {
        let overrides = Options::new()
            .auto_shrink_percentage(0)
            .auto_shrink_min_size(0);
        let resolved = merge(&Options::defaults(), &overrides);

        assert_eq!(resolved.auto_shrink_percentage, 100);
        assert_eq!(resolved.auto_shrink_min_size, 32);
    }

    #[test]
    fn memory_mode_ignores_file() {
        let resolved = merge(
            &Options::defaults(),
            &Options::new().file("ignored.db").mode(Mode::Memory),
        );
        assert_eq!(resolved.file, PathBuf::from(MEMORY_PATH));
    }

    #[test]
    fn file_mode_uses_default_file() {
        let resolved = merge(&Options::defaults(), &Options::new().mode(Mode::File));
        assert_eq!(resolved.file, PathBuf::from(DEFAULT_FILE));
    }

    #[test]
    fn later_layers_win() {
        let base = Options::new().collection("a").auto_shrink_percentage(10);
        let layered = base.merge(Options::new().collection("b"));

        assert_eq!(layered.collection.as_deref(), Some("b"));
        assert_eq!(layered.auto_shrink_percentage, Some(10));
    }

    #[test]
    fn callbacks_copied_verbatim() {
        let hook: OnExpired = Arc::new(|_keys: &[String]| {});
        let resolved = merge(&Options::default(), &Options::new().on_expired(hook));
        assert!(resolved.on_expired.is_some());
        assert!(resolved.on_expired_sync.is_none());
    }

    #[test]
    fn apply_keeps_unmodeled_fields() {
        let current = EngineConfig::new().sweep_interval(Duration::from_millis(250));
        let resolved = merge(&Options::default(), &Options::new());

        let applied = resolved.apply_to(current);
        assert_eq!(applied.sweep_interval, Duration::from_millis(250));
        assert_eq!(applied.sync_policy, SyncPolicy::Never);
        assert_eq!(applied.auto_shrink_min_size, 32);
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("memory".parse::<Mode>().unwrap(), Mode::Memory);
        assert_eq!("MEM".parse::<Mode>().unwrap(), Mode::Memory);
        assert_eq!("file".parse::<Mode>().unwrap(), Mode::File);
        assert_eq!("Disk".parse::<Mode>().unwrap(), Mode::File);
        assert!(matches!(
            "mango".parse::<Mode>(),
            Err(CoreError::InvalidMode { .. })
        ));
        assert_eq!(Mode::File.to_string(), "file");
    }
}
