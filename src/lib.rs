//! Netfetch - cache-aware HTTP resource loading
//!
//! Loads resources over HTTP through an on-disk cache, with a per-request
//! `NetworkPolicy` deciding whether the cache is read, written, or used
//! exclusively.

pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod policy;
pub mod transport;
pub mod ui;

pub use client::{FetchClient, FetchResult};
pub use error::{FetchError, NetfetchError, NetfetchResult};
pub use policy::{CacheDirective, NetworkPolicy};
pub use transport::Transport;
