//! Storage engine configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_REORG_FANOUT, DEFAULT_MEMTABLE_FLUSH_THRESHOLD, DEFAULT_PAGE_FILL_PCT,
    DEFAULT_RECORDS_PER_PAGE_DELTA, DEFAULT_RECORDS_PER_PAGE_GOAL, DEFAULT_REORG_LENGTH,
};

/// Configuration for the storage engine write path.
///
/// # Example
///
/// ```rust
/// use linea_common::config::StorageOptions;
///
/// let options = StorageOptions::default();
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageOptions {
    /// Size in bytes of a full record (key plus value), used for page
    /// capacity math during reorganization planning.
    pub record_size: usize,

    /// Size in bytes of a key.
    pub key_size: usize,

    /// Hard upper bound on the number of pages a chain reorganization may
    /// produce. Chains longer than this are rejected.
    pub max_reorg_fanout: usize,

    /// Initial target fill percentage for pages produced by a chain
    /// reorganization. Raised automatically when the target would exceed
    /// `max_reorg_fanout`.
    pub page_fill_pct: u32,

    /// Chain length at which the flush worker schedules a reorganization.
    pub reorg_length: usize,

    /// Per-page record target for the segment builder.
    pub records_per_page_goal: usize,

    /// Tolerated deviation from `records_per_page_goal`.
    pub records_per_page_delta: usize,

    /// Whether a segment rewrite extends to consecutive neighbors that also
    /// carry overflows.
    pub consider_neighbors_during_rewrite: bool,

    /// Selects the segmented (learned) store variant; when false, the
    /// single-page-chain variant is used.
    pub use_segments: bool,

    /// Opens segment files memory-backed instead of on disk. Intended for
    /// tests and benchmarks.
    pub use_memory_based_io: bool,

    /// Emits a per-size-class segment summary CSV under `debug/` after bulk
    /// loads.
    pub write_debug_info: bool,

    /// Write buffer size, in bytes, at which a flush is triggered.
    pub memtable_flush_threshold: usize,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            record_size: 24,
            key_size: 8,
            max_reorg_fanout: DEFAULT_MAX_REORG_FANOUT,
            page_fill_pct: DEFAULT_PAGE_FILL_PCT,
            reorg_length: DEFAULT_REORG_LENGTH,
            records_per_page_goal: DEFAULT_RECORDS_PER_PAGE_GOAL,
            records_per_page_delta: DEFAULT_RECORDS_PER_PAGE_DELTA,
            consider_neighbors_during_rewrite: true,
            use_segments: true,
            use_memory_based_io: false,
            write_debug_info: false,
            memtable_flush_threshold: DEFAULT_MEMTABLE_FLUSH_THRESHOLD,
        }
    }
}

impl StorageOptions {
    /// Creates a configuration suited to tests: memory-backed files and a
    /// small flush threshold.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            use_memory_based_io: true,
            memtable_flush_threshold: 1024 * 1024,
            ..Default::default()
        }
    }

    /// Validates the configuration and returns an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.key_size == 0 || self.record_size <= self.key_size {
            return Err("record_size must exceed key_size".to_string());
        }
        if self.page_fill_pct == 0 || self.page_fill_pct > 100 {
            return Err("page_fill_pct must be in 1..=100".to_string());
        }
        if self.max_reorg_fanout == 0 {
            return Err("max_reorg_fanout must be > 0".to_string());
        }
        if self.reorg_length < 2 {
            return Err("reorg_length must be at least 2".to_string());
        }
        if self.records_per_page_goal == 0 {
            return Err("records_per_page_goal must be > 0".to_string());
        }
        if self.use_segments && self.key_size != 8 {
            return Err("the segmented store requires 8-byte integer keys".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(StorageOptions::default().validate().is_ok());
        assert!(StorageOptions::for_testing().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut options = StorageOptions::default();
        options.page_fill_pct = 0;
        assert!(options.validate().is_err());

        let mut options = StorageOptions::default();
        options.record_size = 8;
        assert!(options.validate().is_err());

        let mut options = StorageOptions::default();
        options.max_reorg_fanout = 0;
        assert!(options.validate().is_err());

        let mut options = StorageOptions::default();
        options.key_size = 16;
        options.record_size = 32;
        assert!(options.validate().is_err());
    }
}
