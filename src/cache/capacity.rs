//! Disk cache capacity sizing
//!
//! The budget targets a fixed fraction of the total space on the volume
//! holding the cache directory, clamped to a configured range. Sizing is
//! advisory: a failed filesystem query falls back to the minimum.

use std::io;
use std::path::Path;
use tracing::debug;

/// 5 MiB
pub const MIN_DISK_CACHE_SIZE: u64 = 5 * 1024 * 1024;
/// 50 MiB
pub const MAX_DISK_CACHE_SIZE: u64 = 50 * 1024 * 1024;
/// Target 2% of total space
pub const DEFAULT_BUDGET_DIVISOR: u64 = 50;

/// Bounds used to derive a cache size from the filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityBudget {
    pub min_bytes: u64,
    pub max_bytes: u64,
    /// Total space is divided by this to get the target
    pub divisor: u64,
}

impl Default for CapacityBudget {
    fn default() -> Self {
        Self {
            min_bytes: MIN_DISK_CACHE_SIZE,
            max_bytes: MAX_DISK_CACHE_SIZE,
            divisor: DEFAULT_BUDGET_DIVISOR,
        }
    }
}

impl CapacityBudget {
    /// Byte budget for a cache stored in `dir`
    pub fn estimate(&self, dir: &Path) -> u64 {
        match total_space(dir) {
            Ok(total) => self.clamp(total / self.divisor.max(1)),
            Err(e) => {
                debug!(
                    "Could not size cache from {}: {}, using {} bytes",
                    dir.display(),
                    e,
                    self.min_bytes
                );
                self.min_bytes
            }
        }
    }

    /// Bound `size` inside `[min_bytes, max_bytes]`
    pub fn clamp(&self, size: u64) -> u64 {
        size.min(self.max_bytes).max(self.min_bytes)
    }
}

/// Total size in bytes of the filesystem containing `dir`
pub(crate) fn total_space(dir: &Path) -> io::Result<u64> {
    fs2::total_space(dir)
}
