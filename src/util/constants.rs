// logtail - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "logtail";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Framing
// =============================================================================

/// Fixed fill-buffer size for the line framer, in bytes.
pub const BUFFER_SIZE: usize = 8192;

// =============================================================================
// Batching and backoff
// =============================================================================

/// Default maximum number of records per channel transaction.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Initial sleep after a cycle that produced no records (ms).
pub const BACKOFF_SLEEP_BASE_MS: u64 = 250;

/// Upper bound on the exponential backoff sleep (ms).
pub const MAX_BACKOFF_SLEEP_MS: u64 = 5_000;

// =============================================================================
// Registry limits
// =============================================================================

/// Default seconds after which an unmodified tracked file is closed, and an
/// unmatched tracked file is removed from the registry.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 120;

/// Maximum number of simultaneously open file handles. Least-recently-read
/// files beyond this bound are closed (offsets retained) and lazily reopened.
pub const MAX_OPEN_FILES: usize = 512;

// =============================================================================
// Scanner limits
// =============================================================================

/// Upper bound on cached directory listings. The cache is cleared and rebuilt
/// when the bound is reached.
pub const MAX_DIR_CACHE_ENTRIES: usize = 4_096;

// =============================================================================
// Position snapshot
// =============================================================================

/// Default seconds between background position snapshot writes.
pub const DEFAULT_WRITE_POS_INTERVAL_SECS: u64 = 3;

// =============================================================================
// Background threads
// =============================================================================

/// How often the idle-checker closes handles of untouched files (ms).
pub const IDLE_CHECK_INTERVAL_MS: u64 = 1_000;

/// How often the cancel flag is checked within each background sleep (ms).
/// Background threads wake every this many ms so `stop` is prompt.
pub const CANCEL_CHECK_INTERVAL_MS: u64 = 100;

// =============================================================================
// Record headers
// =============================================================================

/// Default header key for the source file path when `fileHeader` is enabled.
pub const DEFAULT_FILE_HEADER_KEY: &str = "file";

/// Header key for the record's starting byte offset.
pub const BYTE_OFFSET_HEADER_KEY: &str = "byteoffset";

/// Header key marking merged multiline records.
pub const MULTILINE_HEADER_KEY: &str = "multiline";

/// Header key carrying the multiline accumulation timestamp (epoch millis).
pub const MULTILINE_TIMESTAMP_HEADER_KEY: &str = "timestamp";

// =============================================================================
// Multiline defaults
// =============================================================================

/// Default seconds after which a stalled multiline event is force-emitted.
pub const DEFAULT_MULTILINE_EVENT_TIMEOUT_SECS: u64 = 5;

/// Default byte cap on a merged multiline body.
pub const DEFAULT_MULTILINE_MAX_BYTES: usize = 10 * 1024 * 1024; // 10 MiB

/// Default line cap on a merged multiline body.
pub const DEFAULT_MULTILINE_MAX_LINES: usize = 500;

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";
