//! Store configuration.

use std::path::PathBuf;

/// Configuration shared by the segment manager, the stores and the
/// backing-store layer.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for file-backed segments. When unset, segments live in
    /// process memory and cannot be opened by another process.
    pub segment_dir: Option<PathBuf>,

    /// Byte size used by [`crate::SegmentManager::create_default_segment`].
    pub default_segment_size: u64,

    /// Failed records a bulk operation tolerates before aborting (0 = unbounded).
    pub max_bulk_failures: u64,

    /// Whether to warn about loops met while resolving inherited target dates.
    pub warn_loops: bool,

    /// Topic index above which a new topic triggers a warning.
    pub high_topic_index_warning: u16,

    /// Whether to sync table files after storing.
    pub sync_on_store: bool,

    /// Whether to create the backing-store directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            segment_dir: None,
            default_segment_size: 64 * 1024 * 1024, // 64 MB
            max_bulk_failures: 0,
            warn_loops: true,
            high_topic_index_warning: 1000,
            sync_on_store: true,
            create_if_missing: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the directory for file-backed segments.
    #[must_use]
    pub fn segment_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.segment_dir = Some(dir.into());
        self
    }

    /// Sets the default segment size.
    #[must_use]
    pub const fn default_segment_size(mut self, size: u64) -> Self {
        self.default_segment_size = size;
        self
    }

    /// Sets how many failed records a bulk operation tolerates.
    #[must_use]
    pub const fn max_bulk_failures(mut self, count: u64) -> Self {
        self.max_bulk_failures = count;
        self
    }

    /// Sets whether target-date loops are warned about.
    #[must_use]
    pub const fn warn_loops(mut self, value: bool) -> Self {
        self.warn_loops = value;
        self
    }

    /// Sets the topic index warning threshold.
    #[must_use]
    pub const fn high_topic_index_warning(mut self, index: u16) -> Self {
        self.high_topic_index_warning = index;
        self
    }

    /// Sets whether to sync table files after storing.
    #[must_use]
    pub const fn sync_on_store(mut self, value: bool) -> Self {
        self.sync_on_store = value;
        self
    }

    /// Sets whether to create the store directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Returns true if `failures` exceeds the bulk failure allowance.
    #[must_use]
    pub const fn exceeds_failure_limit(&self, failures: u64) -> bool {
        self.max_bulk_failures != 0 && failures > self.max_bulk_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.segment_dir.is_none());
        assert!(config.create_if_missing);
        assert!(config.sync_on_store);
        assert_eq!(config.high_topic_index_warning, 1000);
        assert_eq!(config.max_bulk_failures, 0);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .segment_dir("/tmp/fz")
            .max_bulk_failures(5)
            .sync_on_store(false);

        assert_eq!(config.segment_dir, Some(PathBuf::from("/tmp/fz")));
        assert_eq!(config.max_bulk_failures, 5);
        assert!(!config.sync_on_store);
    }

    #[test]
    fn zero_failure_limit_is_unbounded() {
        let config = Config::default();
        assert!(!config.exceeds_failure_limit(u64::MAX));

        let strict = Config::new().max_bulk_failures(2);
        assert!(!strict.exceeds_failure_limit(2));
        assert!(strict.exceeds_failure_limit(3));
    }
}
