//! CLI argument definitions using clap derive

use crate::policy::NetworkPolicy;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use url::Url;

/// Netfetch - cache-aware HTTP fetcher
///
/// Loads resources through an on-disk HTTP cache, with per-request control
/// over whether the cache is read, written, or used exclusively.
#[derive(Parser, Debug)]
#[command(name = "netfetch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "NETFETCH_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a resource and write its body to stdout or a file
    Get(GetArgs),

    /// Load resources into the cache
    Warm(WarmArgs),

    /// Inspect or clear the disk cache
    Cache(CacheArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Per-request cache flags, shared by `get` and `warm`
#[derive(Parser, Debug, Clone, Copy, Default)]
pub struct PolicyArgs {
    /// Only serve from the cache, never touch the network
    #[arg(long)]
    pub offline: bool,

    /// Do not read from the cache
    #[arg(long)]
    pub no_cache: bool,

    /// Do not write to the cache
    #[arg(long)]
    pub no_store: bool,
}

impl PolicyArgs {
    pub fn policy(&self) -> NetworkPolicy {
        let mut policy = NetworkPolicy::empty();
        if self.offline {
            policy |= NetworkPolicy::OFFLINE;
        }
        if self.no_cache {
            policy |= NetworkPolicy::NO_CACHE;
        }
        if self.no_store {
            policy |= NetworkPolicy::NO_STORE;
        }
        policy
    }
}

/// Arguments for the get command
#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Resource URL
    pub url: Url,

    #[command(flatten)]
    pub policy: PolicyArgs,

    /// Write the body to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the warm command
#[derive(Parser, Debug)]
pub struct WarmArgs {
    /// Resource URLs
    #[arg(required = true)]
    pub urls: Vec<Url>,

    #[command(flatten)]
    pub policy: PolicyArgs,

    /// Output format for the summary
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show cache location, size and budget
    Info,

    /// List cached entries
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove every cached entry
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}
