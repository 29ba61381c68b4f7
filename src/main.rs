//! Netfetch - cache-aware HTTP fetcher
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use netfetch::cli::args::{ConfigAction, ConfigArgs};
use netfetch::cli::{Cli, Commands};
use netfetch::config::{Config, ConfigManager};
use netfetch::error::NetfetchResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> NetfetchResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load();

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("netfetch=warn"),
        1 => EnvFilter::new("netfetch=info"),
        _ => EnvFilter::new("netfetch=debug"),
    };
    let json_logs = config
        .as_ref()
        .is_ok_and(|c| c.general.log_format.eq_ignore_ascii_case("json"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json_logs {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }

    // `config path` and `config init` must work even when the file is broken
    let config = match config {
        Err(e) if skips_config(&cli.command) => {
            debug!("Ignoring unreadable config: {}", e);
            Config::default()
        }
        config => config?,
    };
    debug!("Using config {}", config_manager.path().display());

    match cli.command {
        Commands::Get(args) => netfetch::cli::commands::get(args, &config).await,
        Commands::Warm(args) => netfetch::cli::commands::warm(args, &config).await,
        Commands::Cache(args) => netfetch::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            netfetch::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

fn skips_config(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Config(ConfigArgs {
            action: Some(ConfigAction::Path | ConfigAction::Init { .. }),
        })
    )
}
