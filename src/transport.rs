//! HTTP transport with an optional disk cache in front of it
//!
//! A `Transport` either pairs a `ureq` agent with a `DiskCache` or is a bare
//! agent. The cached variant consults the store according to the request's
//! `CacheDirective`, revalidates stale entries, and tees cacheable network
//! bodies into the store as they are read.

use crate::cache::freshness::{is_cacheable, CachedResponse};
use crate::cache::{self, CacheHit, CapacityBudget, DiskCache};
use crate::policy::CacheDirective;
use chrono::Utc;
use std::fmt;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use ureq::http::{HeaderMap, StatusCode};
use ureq::Agent;
use url::Url;

/// Reason phrase of the response synthesized for an unsatisfiable cache-only request
pub const UNSATISFIABLE_REASON: &str = "Unsatisfiable Request (only-if-cached)";

/// A response from the network or the cache
pub struct Response {
    pub status: u16,
    pub reason: String,
    /// Header names are lowercase
    pub headers: Vec<(String, String)>,
    pub body: Box<dyn Read + Send>,
    /// Whether the body is read from the disk cache
    pub from_cache: bool,
    pub content_length: Option<u64>,
}

impl Response {
    fn from_hit(hit: CacheHit) -> Self {
        Self {
            status: hit.meta.status,
            reason: hit.meta.reason,
            headers: hit.meta.headers,
            body: Box::new(hit.body),
            from_cache: true,
            content_length: Some(hit.meta.size_bytes),
        }
    }

    fn empty(status: u16, reason: &str) -> Self {
        Self {
            status,
            reason: reason.to_string(),
            headers: Vec::new(),
            body: Box::new(io::empty()),
            from_cache: false,
            content_length: Some(0),
        }
    }

    /// First value of a header, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("from_cache", &self.from_cache)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Build an agent that reports HTTP error statuses as responses
pub fn default_agent(timeout: Option<Duration>) -> Agent {
    Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(timeout)
        .build()
        .into()
}

/// Create the cache a default client would install under `base`:
/// `base/http-cache`, sized from the volume it lives on.
pub fn default_cache(base: &Path, budget: &CapacityBudget) -> Arc<DiskCache> {
    let dir = cache::provision(base);
    let max_size = budget.estimate(&dir);
    Arc::new(DiskCache::open(dir, max_size))
}

/// The HTTP substrate a fetch client issues requests through
#[derive(Clone)]
pub enum Transport {
    /// Agent with a disk cache; the cache is closed when the client shuts down
    Cached { agent: Agent, cache: Arc<DiskCache> },
    /// Agent without a cache; nothing is ever served from cache
    Direct(Agent),
}

impl Transport {
    pub fn cached(agent: Agent, cache: Arc<DiskCache>) -> Self {
        Self::Cached { agent, cache }
    }

    pub fn direct(agent: Agent) -> Self {
        Self::Direct(agent)
    }

    pub fn agent(&self) -> &Agent {
        match self {
            Self::Cached { agent, .. } | Self::Direct(agent) => agent,
        }
    }

    /// The cache this transport owns, if any
    pub fn cache(&self) -> Option<&Arc<DiskCache>> {
        match self {
            Self::Cached { cache, .. } => Some(cache),
            Self::Direct(_) => None,
        }
    }

    /// Perform a GET for `url` under `directive`.
    ///
    /// HTTP error statuses are returned as responses; only I/O and protocol
    /// failures are errors. A cache-only request that the cache cannot answer
    /// yields a synthesized `504`.
    pub fn execute(&self, url: &Url, directive: CacheDirective) -> Result<Response, ureq::Error> {
        let cache = self.cache().filter(|c| !c.is_closed());

        let cached = match cache {
            Some(cache) if directive.reads_cache() => lookup(cache, url),
            _ => None,
        };

        let stale = match cached {
            Some(hit) if !directive.allows_network() || hit.meta.is_fresh(Utc::now()) => {
                debug!("Serving {} from cache", url);
                return Ok(Response::from_hit(hit));
            }
            other => other.filter(|hit| hit.meta.has_validators()),
        };

        if !directive.allows_network() {
            debug!("No cached response for {} and network is not allowed", url);
            return Ok(Response::empty(504, UNSATISFIABLE_REASON));
        }

        let mut request = self.agent().get(url.as_str());
        if let Some(value) = directive.header_value() {
            request = request.header("Cache-Control", value);
        }
        if let Some(hit) = &stale {
            for (name, value) in hit.meta.conditional_headers() {
                request = request.header(name, value);
            }
        }

        let sent_at = Utc::now();
        let response = match request.call() {
            Ok(response) => response,
            // Agents configured to treat statuses as errors have already
            // released the body
            Err(ureq::Error::StatusCode(code)) => {
                return Ok(Response::empty(code, canonical_reason(code)));
            }
            Err(e) => return Err(e),
        };
        let received_at = Utc::now();

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());

        if status == 304 {
            if let Some(mut hit) = stale {
                drop(response);
                debug!("Revalidated cached {}", url);
                let stored_received_at = hit.meta.received_at;
                hit.meta.refresh(&headers, sent_at, received_at);
                if let Some(cache) = cache.filter(|_| directive.writes_cache()) {
                    if let Err(e) = cache.update(&hit.meta, stored_received_at) {
                        warn!("Failed to update cached headers for {}: {}", url, e);
                    }
                }
                return Ok(Response::from_hit(hit));
            }
        }

        let content_length = headers
            .iter()
            .find(|(n, _)| n == "content-length")
            .and_then(|(_, v)| v.trim().parse::<u64>().ok());
        let reason = canonical_reason(status).to_string();
        let reader = response.into_body().into_reader();

        let body: Box<dyn Read + Send> = match cache {
            Some(cache) if directive.writes_cache() && is_cacheable(status, &headers) => {
                let meta = CachedResponse::new(
                    url.as_str(),
                    status,
                    reason.clone(),
                    headers.clone(),
                    sent_at,
                    received_at,
                );
                Box::new(cache.begin_store(meta, reader))
            }
            _ => Box::new(reader),
        };

        Ok(Response {
            status,
            reason,
            headers,
            body,
            from_cache: false,
            content_length,
        })
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cached { cache, .. } => f
                .debug_struct("Transport::Cached")
                .field("cache", &cache.directory())
                .field("max_size", &cache.max_size())
                .finish_non_exhaustive(),
            Self::Direct(_) => f.write_str("Transport::Direct"),
        }
    }
}

fn lookup(cache: &DiskCache, url: &Url) -> Option<CacheHit> {
    match cache.get(url.as_str()) {
        Ok(hit) => hit,
        Err(e) => {
            warn!("Cache read failed for {}: {}", url, e);
            None
        }
    }
}

fn canonical_reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}

fn collect_headers(map: &HeaderMap) -> Vec<(String, String)> {
    map.iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}
