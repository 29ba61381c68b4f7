//! Configuration schema for netfetch
//!
//! Configuration is stored at `~/.config/netfetch/config.toml`

use crate::cache::{self, CapacityBudget};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Disk cache settings
    pub cache: CacheConfig,

    /// HTTP transport settings
    pub http: HttpConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Disk cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Use a disk cache at all
    pub enabled: bool,

    /// Cache directory (defaults to `<platform cache dir>/netfetch/http-cache`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Fixed cache size in bytes, skipping the filesystem-based estimate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size_bytes: Option<u64>,

    /// Lower bound for the estimated size
    pub min_size_bytes: u64,

    /// Upper bound for the estimated size
    pub max_budget_bytes: u64,

    /// The estimate is total volume size divided by this
    pub budget_divisor: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let budget = CapacityBudget::default();
        Self {
            enabled: true,
            dir: None,
            max_size_bytes: None,
            min_size_bytes: budget.min_bytes,
            max_budget_bytes: budget.max_bytes,
            budget_divisor: budget.divisor,
        }
    }
}

impl CacheConfig {
    pub fn budget(&self) -> CapacityBudget {
        CapacityBudget {
            min_bytes: self.min_size_bytes,
            max_bytes: self.max_budget_bytes.max(self.min_size_bytes),
            divisor: self.budget_divisor,
        }
    }

    /// Resolve the cache directory, creating the default one if needed
    pub fn resolve_dir(&self) -> PathBuf {
        match &self.dir {
            Some(dir) => dir.clone(),
            None => cache::provision(&cache::default_base_dir()),
        }
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Overall timeout per request in seconds (none by default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl HttpConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
