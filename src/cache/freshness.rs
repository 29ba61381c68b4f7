//! Cached response metadata and HTTP freshness rules
//!
//! A private-cache subset of RFC 9111: explicit lifetimes from `max-age` or
//! `Expires`, a 10% heuristic from `Last-Modified`, and revalidation through
//! `ETag` / `Last-Modified` validators.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Status codes whose responses may be stored without explicit freshness
const CACHEABLE_STATUS: [u16; 11] = [200, 203, 204, 300, 301, 308, 404, 405, 410, 414, 501];

/// Directive values larger than this are clamped
const MAX_DELTA_SECONDS: u64 = i32::MAX as u64;

/// Parsed `Cache-Control` directives relevant to a private cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheControl {
    pub no_cache: bool,
    pub no_store: bool,
    pub max_age: Option<u64>,
    pub must_revalidate: bool,
    pub only_if_cached: bool,
    pub max_stale: Option<u64>,
}

impl CacheControl {
    /// Parse one or more `Cache-Control` header values
    pub fn parse<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut cc = Self::default();
        for value in values {
            for directive in value.split(',') {
                let directive = directive.trim();
                if directive.is_empty() {
                    continue;
                }
                let (name, arg) = match directive.split_once('=') {
                    Some((n, a)) => (n.trim(), Some(a.trim().trim_matches('"'))),
                    None => (directive, None),
                };
                match name.to_ascii_lowercase().as_str() {
                    "no-cache" => cc.no_cache = true,
                    "no-store" => cc.no_store = true,
                    "must-revalidate" => cc.must_revalidate = true,
                    "only-if-cached" => cc.only_if_cached = true,
                    "max-age" => cc.max_age = arg.and_then(parse_delta_seconds),
                    // A bare max-stale accepts any staleness
                    "max-stale" => {
                        cc.max_stale =
                            Some(arg.and_then(parse_delta_seconds).unwrap_or(MAX_DELTA_SECONDS))
                    }
                    _ => {}
                }
            }
        }
        cc
    }
}

fn parse_delta_seconds(s: &str) -> Option<u64> {
    s.parse::<u64>().ok().map(|v| v.min(MAX_DELTA_SECONDS))
}

/// Parse an IMF-fixdate such as `Mon, 29 Dec 2014 21:44:55 GMT`
pub fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Format a timestamp as an IMF-fixdate
pub fn format_http_date(date: DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Whether a response with this status and headers may be written to cache
pub fn is_cacheable(status: u16, headers: &[(String, String)]) -> bool {
    if !CACHEABLE_STATUS.contains(&status) {
        return false;
    }
    if header_values(headers, "vary").any(|v| v.trim() == "*") {
        return false;
    }
    !CacheControl::parse(header_values(headers, "cache-control")).no_store
}

fn header_values<'a>(
    headers: &'a [(String, String)],
    name: &'static str,
) -> impl Iterator<Item = &'a str> + 'a {
    headers
        .iter()
        .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Metadata stored alongside a cached response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    /// Request URL the entry answers
    pub url: String,
    pub status: u16,
    pub reason: String,
    /// Response headers with lowercased names, in received order
    pub headers: Vec<(String, String)>,
    /// When the request that produced this entry was sent
    pub sent_at: DateTime<Utc>,
    /// When its response headers arrived
    pub received_at: DateTime<Utc>,
    /// Last time the entry was served
    pub last_used_at: DateTime<Utc>,
    /// Body size in bytes
    pub size_bytes: u64,
}

impl CachedResponse {
    /// Create metadata for a response that has not been stored yet
    pub fn new(
        url: impl Into<String>,
        status: u16,
        reason: impl Into<String>,
        headers: Vec<(String, String)>,
        sent_at: DateTime<Utc>,
        received_at: DateTime<Utc>,
    ) -> Self {
        let headers = headers
            .into_iter()
            .map(|(n, v)| (n.to_ascii_lowercase(), v))
            .collect();
        Self {
            url: url.into(),
            status,
            reason: reason.into(),
            headers,
            sent_at,
            received_at,
            last_used_at: received_at,
            size_bytes: 0,
        }
    }

    /// First value of a header, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn cache_control(&self) -> CacheControl {
        CacheControl::parse(header_values(&self.headers, "cache-control"))
    }

    pub fn etag(&self) -> Option<&str> {
        self.header("etag")
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.header("last-modified")
    }

    /// Whether a stale entry can be revalidated with a conditional request
    pub fn has_validators(&self) -> bool {
        self.etag().is_some() || self.last_modified().is_some()
    }

    /// Headers for a conditional GET against this entry
    pub fn conditional_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if let Some(etag) = self.etag() {
            headers.push(("If-None-Match", etag.to_string()));
        } else if let Some(last_modified) = self.last_modified() {
            headers.push(("If-Modified-Since", last_modified.to_string()));
        }
        headers
    }

    /// How long the response stays fresh after it was generated
    pub fn freshness_lifetime(&self) -> TimeDelta {
        if let Some(max_age) = self.cache_control().max_age {
            return seconds(max_age);
        }

        let served = self
            .header("date")
            .and_then(parse_http_date)
            .unwrap_or(self.received_at);

        if let Some(expires) = self.header("expires").and_then(parse_http_date) {
            return (expires - served).max(TimeDelta::zero());
        }

        let has_query = url::Url::parse(&self.url)
            .map(|u| u.query().is_some())
            .unwrap_or(false);
        if !has_query {
            if let Some(last_modified) = self.last_modified().and_then(parse_http_date) {
                let since_modified = served - last_modified;
                if since_modified > TimeDelta::zero() {
                    return since_modified / 10;
                }
            }
        }

        TimeDelta::zero()
    }

    /// Age of the response at `now`
    pub fn current_age(&self, now: DateTime<Utc>) -> TimeDelta {
        let age_header = self
            .header("age")
            .and_then(parse_delta_seconds)
            .map(seconds)
            .unwrap_or_else(TimeDelta::zero);
        let apparent = self
            .header("date")
            .and_then(parse_http_date)
            .map(|date| (self.received_at - date).max(TimeDelta::zero()))
            .unwrap_or_else(TimeDelta::zero);
        let resident = (now - self.received_at).max(TimeDelta::zero());
        apparent.max(age_header) + resident
    }

    /// Whether the entry can be served at `now` without contacting the origin
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        if self.cache_control().no_cache {
            return false;
        }
        self.current_age(now) < self.freshness_lifetime()
    }

    /// Fold the headers of a `304 Not Modified` into this entry
    pub fn refresh(
        &mut self,
        not_modified_headers: &[(String, String)],
        sent_at: DateTime<Utc>,
        received_at: DateTime<Utc>,
    ) {
        // A 304 carries no body; the stored entity headers stay authoritative
        let updates: Vec<(String, String)> = not_modified_headers
            .iter()
            .map(|(n, v)| (n.to_ascii_lowercase(), v.clone()))
            .filter(|(n, _)| !matches!(n.as_str(), "content-length" | "content-encoding" | "content-type"))
            .collect();
        self.headers
            .retain(|(n, _)| !updates.iter().any(|(u, _)| u == n));
        self.headers.extend(updates);
        self.sent_at = sent_at;
        self.received_at = received_at;
    }

    /// Mark the entry as served now
    pub fn touch(&mut self) {
        self.last_used_at = Utc::now();
    }
}

fn seconds(secs: u64) -> TimeDelta {
    TimeDelta::seconds(secs.min(MAX_DELTA_SECONDS) as i64)
}
