//! Cache shutdown

use crate::cache::DiskCache;
use crate::transport::Transport;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns the cache handle of a client and closes it at teardown
#[derive(Debug)]
pub struct Lifecycle {
    cache: Option<Arc<DiskCache>>,
}

impl Lifecycle {
    /// Take responsibility for whatever cache `transport` carries, including
    /// one the caller configured themselves.
    pub fn for_transport(transport: &Transport) -> Self {
        Self {
            cache: transport.cache().cloned(),
        }
    }

    pub fn owns_cache(&self) -> bool {
        self.cache.is_some()
    }

    /// Whether the owned cache has been closed. Always false without a cache.
    pub fn is_shut_down(&self) -> bool {
        self.cache.as_ref().is_some_and(|c| c.is_closed())
    }

    /// Close the owned cache. Safe to call any number of times; errors are
    /// logged and never returned.
    pub fn shutdown(&self) {
        let Some(cache) = &self.cache else {
            debug!("No cache to close");
            return;
        };
        if cache.is_closed() {
            return;
        }

        match cache.close() {
            Ok(()) => info!("Closed cache {}", cache.directory().display()),
            Err(e) => warn!(
                "Ignoring error while closing cache {}: {}",
                cache.directory().display(),
                e
            ),
        }
    }
}
