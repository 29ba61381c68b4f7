//! CLI command implementations

pub mod cache;
pub mod config;
pub mod get;
pub mod warm;

pub use cache::execute as cache;
pub use config::execute as config;
pub use get::execute as get;
pub use warm::execute as warm;
