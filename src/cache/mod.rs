//! Disk cache backing the fetch client
//!
//! Sizing and placement run once when a client is built; the store is then
//! shared by every request that client issues.
//!
//! # Entry Lifecycle
//!
//! | Step | Trigger | Effect |
//! |------|---------|--------|
//! | Store | Network body read to the end | Entry committed, LRU trimmed to budget |
//! | Hit | Fresh entry, or any entry when offline | Body served from disk |
//! | Revalidate | Stale entry with validators | Conditional GET, `304` refreshes headers |
//! | Close | Client shutdown | No further reads or writes |

pub mod capacity;
pub mod dir;
pub mod freshness;
pub mod store;

pub use capacity::{CapacityBudget, MAX_DISK_CACHE_SIZE, MIN_DISK_CACHE_SIZE};
pub use dir::{default_base_dir, provision, CACHE_DIR_NAME};
pub use freshness::{CacheControl, CachedResponse};
pub use store::{CacheHit, CacheWriter, DiskCache};
