//! Global configuration and tuning constants.
//!
//! The memory-map toggle is process wide; a store built with
//! `AceStoreBuilder::memory_map` overrides it.

use std::sync::atomic::{AtomicBool, Ordering};

/// Global flag enabling memory-mapped access for indexed stores.
static MEMORY_MAP: AtomicBool = AtomicBool::new(true);

/// Files smaller than this are always read with buffered I/O (64 KB).
pub const MMAP_THRESHOLD: u64 = 64 * 1024;

/// Minimum ungapped consensus length before per-column work goes parallel.
pub const PARALLEL_THRESHOLD: usize = 10_000;

/// Input buffer size used by the line dispatcher (256 KB).
pub const DEFAULT_INPUT_BUFFER: usize = 256 * 1024;

/// Output buffer size used by the writer (2 MB).
pub const DEFAULT_OUTPUT_BUFFER: usize = 2 * 1024 * 1024;

/// Number of built contigs the streaming iterator may queue ahead of the
/// consumer.
pub const STREAM_QUEUE_CAPACITY: usize = 16;

/// Basecalls per line when writing consensus and read sequences.
pub const BASES_PER_LINE: usize = 50;

/// Quality values per line in a `BQ` block.
pub const QUALITIES_PER_LINE: usize = 50;

/// Consensus quality written when none is stored or computed.
pub const DEFAULT_CONSENSUS_QUALITY: u8 = 99;

/// Enable or disable memory mapping for indexed stores.
///
/// # Example
///
/// ```
/// use ace_assembly::config;
///
/// config::set_memory_map(false);
/// assert!(!config::is_memory_map_enabled());
/// config::set_memory_map(true);
/// ```
#[inline]
pub fn set_memory_map(enabled: bool) {
    MEMORY_MAP.store(enabled, Ordering::Release);
}

/// Check if memory mapping is enabled.
#[inline]
pub fn is_memory_map_enabled() -> bool {
    MEMORY_MAP.load(Ordering::Acquire)
}

/// Decide whether a file of `file_len` bytes should be memory mapped.
///
/// `requested` is a per-store override; `None` defers to the global flag.
#[inline]
pub fn should_memory_map(requested: Option<bool>, file_len: u64) -> bool {
    requested.unwrap_or_else(is_memory_map_enabled) && file_len >= MMAP_THRESHOLD
}
