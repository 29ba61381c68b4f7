//! Cache directory placement

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Subdirectory holding cache entries, under the application cache root
pub const CACHE_DIR_NAME: &str = "http-cache";

/// Platform cache root for netfetch (e.g. `~/.cache/netfetch`)
pub fn default_base_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("netfetch")
}

/// Resolve `base/http-cache`, creating it and any missing parents.
///
/// Creation is best effort: a failure is logged and the path is still
/// returned, so the first cache write reports the real error.
pub fn provision(base: &Path) -> PathBuf {
    let dir = base.join(CACHE_DIR_NAME);
    if dir.is_dir() {
        return dir;
    }

    match fs::create_dir_all(&dir) {
        Ok(()) => debug!("Created cache directory {}", dir.display()),
        Err(e) => warn!("Could not create cache directory {}: {}", dir.display(), e),
    }
    dir
}
