//! System-wide constants for LineaDB.

// =============================================================================
// Page Constants
// =============================================================================

/// Size of an on-disk page in bytes (4 KB).
///
/// Every page in the store, including overflow pages and segment pages, uses
/// this size. It matches the typical SSD block size.
pub const PAGE_SIZE: usize = 4 * 1024;

// =============================================================================
// Segment Constants
// =============================================================================

/// The admissible segment sizes, in pages. Size class `i` holds segments of
/// `2^i` pages.
pub const SEGMENT_PAGE_COUNTS: [usize; 5] = [1, 2, 4, 8, 16];

/// The largest admissible segment size, in pages.
pub const MAX_SEGMENT_PAGE_COUNT: usize = 16;

/// Number of page slots in the sliding window used by segment rewrites.
///
/// Four times the maximum segment size: a 16-page segment can carry up to one
/// overflow per page, so the window spans two maximal segments plus their
/// overflows in the worst case.
pub const REWRITE_WINDOW_PAGES: usize = 4 * MAX_SEGMENT_PAGE_COUNT;

/// File name prefix for segment files. The full name is `<prefix><i>` where
/// `i` is the size class.
pub const SEGMENT_FILE_PREFIX: &str = "segments-";

/// Directory name for optional debug output.
pub const DEBUG_DIR_NAME: &str = "debug";

/// File name of the segment summary emitted when `write_debug_info` is set.
pub const SEGMENT_SUMMARY_CSV: &str = "segment_summary.csv";

// =============================================================================
// Write Buffer Constants
// =============================================================================

/// Default flush threshold for the in-memory write buffer (64 MB).
pub const DEFAULT_MEMTABLE_FLUSH_THRESHOLD: usize = 64 * 1024 * 1024;

// =============================================================================
// Reorganization Defaults
// =============================================================================

/// Default hard bound on the number of pages a chain reorganization may
/// produce.
pub const DEFAULT_MAX_REORG_FANOUT: usize = 16;

/// Default target fill percentage for pages produced by a chain
/// reorganization.
pub const DEFAULT_PAGE_FILL_PCT: u32 = 50;

/// Default chain length at which the flush worker schedules a
/// reorganization.
pub const DEFAULT_REORG_LENGTH: usize = 5;

/// Default per-page record goal for the segment builder.
pub const DEFAULT_RECORDS_PER_PAGE_GOAL: usize = 44;

/// Default tolerated deviation from the per-page record goal.
pub const DEFAULT_RECORDS_PER_PAGE_DELTA: usize = 5;
