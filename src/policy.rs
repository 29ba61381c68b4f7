//! Network policy flags and their translation into cache directives
//!
//! A `NetworkPolicy` is a bitmask of independent fetch intents. Translation
//! follows a fixed precedence:
//!
//! 1. Empty policy: no directive, transport and cache defaults apply.
//! 2. `OFFLINE` (or `SKIP_NETWORK`): force the response from cache.
//! 3. Otherwise: skip cache reads and/or writes per `NO_CACHE` / `NO_STORE`.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// `Cache-Control` value that forces a cached response, stale or not
pub const FORCE_CACHE_HEADER: &str = "only-if-cached, max-stale=2147483647";

/// Caller-specified bit flags controlling cache read/write/offline behavior
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NetworkPolicy(u32);

impl NetworkPolicy {
    /// Skip reading the disk cache; always go to the network
    pub const NO_CACHE: Self = Self(1 << 0);
    /// Skip writing the response to the disk cache
    pub const NO_STORE: Self = Self(1 << 1);
    /// Serve only from the disk cache; never touch the network
    pub const OFFLINE: Self = Self(1 << 2);
    /// Never touch the network. Treated exactly like `OFFLINE`.
    pub const SKIP_NETWORK: Self = Self(1 << 3);

    /// Policy with no flags set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build from raw bits. Unknown bits are kept but have no effect.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bitmask
    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every bit of `other` is set in `self`
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the request must be answered from cache alone
    pub const fn is_offline_only(self) -> bool {
        self.0 & (Self::OFFLINE.0 | Self::SKIP_NETWORK.0) != 0
    }

    pub const fn should_read_from_disk_cache(self) -> bool {
        !self.contains(Self::NO_CACHE)
    }

    pub const fn should_write_to_disk_cache(self) -> bool {
        !self.contains(Self::NO_STORE)
    }
}

impl BitOr for NetworkPolicy {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for NetworkPolicy {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<u32> for NetworkPolicy {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl fmt::Display for NetworkPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "default");
        }
        let names = [
            (Self::NO_CACHE, "no-cache"),
            (Self::NO_STORE, "no-store"),
            (Self::OFFLINE, "offline"),
            (Self::SKIP_NETWORK, "skip-network"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "{:#x}", self.0)
        } else {
            write!(f, "{}", set.join("|"))
        }
    }
}

/// Concrete cache instruction attached to one outgoing request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDirective {
    /// Attach nothing
    None,
    /// Answer from cache only; a miss is a failure, not a network fallback
    ForceCache,
    /// Bypass cache reads and/or writes
    Custom { skip_read: bool, skip_write: bool },
}

impl CacheDirective {
    /// Translate a network policy. `OFFLINE` absorbs every other flag.
    pub fn from_policy(policy: NetworkPolicy) -> Self {
        if policy.is_empty() {
            Self::None
        } else if policy.is_offline_only() {
            Self::ForceCache
        } else {
            Self::Custom {
                skip_read: !policy.should_read_from_disk_cache(),
                skip_write: !policy.should_write_to_disk_cache(),
            }
        }
    }

    /// `Cache-Control` request header for this directive, if any
    pub fn header_value(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::ForceCache => Some(FORCE_CACHE_HEADER),
            Self::Custom {
                skip_read,
                skip_write,
            } => match (skip_read, skip_write) {
                (true, true) => Some("no-cache, no-store"),
                (true, false) => Some("no-cache"),
                (false, true) => Some("no-store"),
                (false, false) => None,
            },
        }
    }

    pub fn allows_network(&self) -> bool {
        !matches!(self, Self::ForceCache)
    }

    pub fn reads_cache(&self) -> bool {
        !matches!(self, Self::Custom { skip_read: true, .. })
    }

    pub fn writes_cache(&self) -> bool {
        !matches!(
            self,
            Self::ForceCache | Self::Custom { skip_write: true, .. }
        )
    }
}

impl From<NetworkPolicy> for CacheDirective {
    fn from(policy: NetworkPolicy) -> Self {
        Self::from_policy(policy)
    }
}
