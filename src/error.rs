//! Error types for netfetch
//!
//! All fallible operations return `NetfetchResult<T>`.

use crate::policy::NetworkPolicy;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for netfetch operations
pub type NetfetchResult<T> = Result<T, NetfetchError>;

/// A non-success HTTP outcome, carrying the policy the request was made under
/// so callers can retry with a different one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FetchError {
    /// HTTP status code (>= 300)
    pub status: u16,
    /// `"<status> <reason phrase>"`. The reason is the canonical phrase for
    /// the status (`401 Unauthorized`), not the text the server sent, which
    /// `ureq` does not expose.
    pub message: String,
    /// Policy in effect for the failed request
    pub policy: NetworkPolicy,
}

impl FetchError {
    /// Build from a status code and reason phrase
    pub fn new(status: u16, reason: &str, policy: NetworkPolicy) -> Self {
        let message = if reason.is_empty() {
            status.to_string()
        } else {
            format!("{} {}", status, reason)
        };
        Self {
            status,
            message,
            policy,
        }
    }
}

/// All errors that can occur in netfetch
#[derive(Error, Debug)]
pub enum NetfetchError {
    // Fetch errors
    #[error(transparent)]
    Response(#[from] FetchError),

    #[error(transparent)]
    Transport(#[from] ureq::Error),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("{0}")]
    User(String),
}

impl NetfetchError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// HTTP status of a response error, if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response(e) => Some(e.status),
            _ => None,
        }
    }

    /// Check if the same request could succeed under a different policy or later
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Response(e) => match e.status {
                408 | 429 => true,
                s => (500..600).contains(&s),
            },
            Self::Transport(_) => true,
            _ => false,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Response(e) if e.status == 504 && e.policy.is_offline_only() => {
                Some("Not in the cache yet. Retry without --offline to fetch it")
            }
            Self::Response(e) if e.status == 401 || e.status == 403 => {
                Some("The server refused the request; check the URL and credentials")
            }
            Self::ConfigInvalid { .. } => Some("Run: netfetch config init --force"),
            _ => None,
        }
    }
}
