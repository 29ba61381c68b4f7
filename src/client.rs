//! Cache-aware resource fetching
//!
//! `FetchClient` turns a `NetworkPolicy` into a cache directive, runs the
//! request through its `Transport`, and either hands back the body or fails
//! with the status the server (or the cache) answered with.

use crate::cache::{CapacityBudget, DiskCache};
use crate::config::Config;
use crate::error::{FetchError, NetfetchResult};
use crate::lifecycle::Lifecycle;
use crate::policy::{CacheDirective, NetworkPolicy};
use crate::transport::{self, default_agent, Response, Transport};
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// A successfully loaded resource
pub struct FetchResult {
    /// Response body; the connection or cache file is released once it is
    /// read to the end or dropped
    pub body: Box<dyn Read + Send>,
    pub from_cache: bool,
    /// `None` when the length is unknown
    pub content_length: Option<u64>,
}

impl FetchResult {
    /// Read the whole body into memory
    pub fn into_bytes(mut self) -> io::Result<Vec<u8>> {
        let mut buf = match self.content_length {
            Some(len) => Vec::with_capacity(len.min(16 * 1024 * 1024) as usize),
            None => Vec::new(),
        };
        self.body.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl Read for FetchResult {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.body.read(buf)
    }
}

impl fmt::Debug for FetchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResult")
            .field("from_cache", &self.from_cache)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Blocking HTTP client with an optional disk cache
#[derive(Debug)]
pub struct FetchClient {
    transport: Transport,
    lifecycle: Lifecycle,
}

impl FetchClient {
    /// Client with a cache under `base/http-cache`, sized from the volume.
    ///
    /// Construction never fails: an unusable cache directory is logged and
    /// the client loads from the network until the directory works.
    pub fn new(base: &Path) -> Self {
        let cache = transport::default_cache(base, &CapacityBudget::default());
        Self::with_transport(Transport::cached(default_agent(None), cache))
    }

    /// Client with a cache in `dir`, sized from the volume `dir` lives on
    pub fn with_cache_dir(dir: impl Into<PathBuf>) -> Self {
        let cache = open_cache(&dir.into(), None, &CapacityBudget::default());
        Self::with_transport(Transport::cached(default_agent(None), cache))
    }

    /// Client with a cache in `dir` holding at most `max_size` bytes
    pub fn with_cache_dir_and_size(dir: impl Into<PathBuf>, max_size: u64) -> Self {
        let cache = open_cache(&dir.into(), Some(max_size), &CapacityBudget::default());
        Self::with_transport(Transport::cached(default_agent(None), cache))
    }

    /// Client built from the `[cache]` and `[http]` sections of `config`
    pub fn from_config(config: &Config) -> Self {
        let agent = default_agent(config.http.timeout());
        if !config.cache.enabled {
            debug!("Disk cache disabled by configuration");
            return Self::with_transport(Transport::direct(agent));
        }

        let cache = open_cache(
            &config.cache.resolve_dir(),
            config.cache.max_size_bytes,
            &config.cache.budget(),
        );
        Self::with_transport(Transport::cached(agent, cache))
    }

    /// Client over a caller-supplied transport. A cache it carries is closed
    /// on `shutdown` like an owned one.
    pub fn with_transport(transport: Transport) -> Self {
        let lifecycle = Lifecycle::for_transport(&transport);
        Self {
            transport,
            lifecycle,
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn cache(&self) -> Option<&Arc<DiskCache>> {
        self.transport.cache()
    }

    /// Fetch `locator` under `policy`.
    ///
    /// Blocks until the response headers arrive. Statuses of 300 and above
    /// are errors; the body is released before the error is returned.
    pub fn load(&self, locator: &Url, policy: NetworkPolicy) -> NetfetchResult<FetchResult> {
        let directive = CacheDirective::from_policy(policy);
        debug!("Loading {} ({}, {:?})", locator, policy, directive);

        let response = self.transport.execute(locator, directive)?;
        let Response {
            status,
            reason,
            body,
            from_cache,
            content_length,
            ..
        } = response;

        if status >= 300 {
            drop(body);
            debug!("{} answered {} {}", locator, status, reason);
            return Err(FetchError::new(status, &reason, policy).into());
        }

        Ok(FetchResult {
            body,
            from_cache,
            content_length,
        })
    }

    /// Close the cache, if any. Later loads go to the network.
    pub fn shutdown(&self) {
        self.lifecycle.shutdown();
    }

    pub fn is_shut_down(&self) -> bool {
        self.lifecycle.is_shut_down()
    }
}

/// Open a cache in `dir`, sizing it from the volume unless `max_size` is given
fn open_cache(dir: &Path, max_size: Option<u64>, budget: &CapacityBudget) -> Arc<DiskCache> {
    // Created ahead of sizing; `DiskCache::open` reports a failure
    if let Err(e) = fs::create_dir_all(dir) {
        debug!("Sizing {} without creating it: {}", dir.display(), e);
    }
    let max_size = max_size.unwrap_or_else(|| budget.estimate(dir));
    Arc::new(DiskCache::open(dir, max_size))
}
