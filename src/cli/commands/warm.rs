//! Warm command - load resources into the cache

use crate::cli::args::{OutputFormat, WarmArgs};
use crate::client::FetchClient;
use crate::config::Config;
use crate::error::{NetfetchError, NetfetchResult};
use crate::policy::NetworkPolicy;
use crate::ui::{self, TaskSpinner, UiContext};
use console::style;
use serde::Serialize;
use std::io;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use url::Url;

/// Result of warming one URL
#[derive(Debug, Serialize)]
struct WarmOutcome {
    url: String,
    /// "cache", "network" or "failed"
    source: &'static str,
    bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Execute the warm command
pub async fn execute(args: WarmArgs, config: &Config) -> NetfetchResult<()> {
    let ctx = UiContext::detect();
    let client = Arc::new(FetchClient::from_config(config));
    let policy = args.policy.policy();

    if client.cache().is_none() {
        ui::step_warn_hint(
            &ctx,
            "Disk cache is disabled",
            "Nothing will be kept; set [cache] enabled = true",
        );
    }

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Warming {} resource(s)...", args.urls.len()));

    let mut tasks = JoinSet::new();
    for (index, url) in args.urls.into_iter().enumerate() {
        let client = Arc::clone(&client);
        tasks.spawn_blocking(move || (index, warm_one(&client, &url, policy)));
    }

    let mut outcomes = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.map_err(|e| NetfetchError::User(format!("Warm task failed: {}", e)))?;
        outcomes.push(outcome);
    }
    outcomes.sort_by_key(|(index, _)| *index);
    let outcomes: Vec<WarmOutcome> = outcomes.into_iter().map(|(_, o)| o).collect();

    client.shutdown();

    let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
    if failed == 0 {
        spinner.stop(&format!("Warmed {} resource(s)", outcomes.len()));
    } else {
        spinner.stop_warn(&format!(
            "Warmed {} of {} resource(s)",
            outcomes.len() - failed,
            outcomes.len()
        ));
    }

    match args.format {
        OutputFormat::Table => print_table(&outcomes),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcomes)?),
        OutputFormat::Plain => print_plain(&outcomes),
    }

    if failed > 0 {
        return Err(NetfetchError::User(format!(
            "{} resource(s) could not be loaded",
            failed
        )));
    }
    Ok(())
}

/// Load `url` and read its body to the end so the cache commits it
fn warm_one(client: &FetchClient, url: &Url, policy: NetworkPolicy) -> WarmOutcome {
    let attempt = client.load(url, policy).and_then(|mut result| {
        let bytes = io::copy(&mut result, &mut io::sink())
            .map_err(|e| NetfetchError::io(format!("reading body of {}", url), e))?;
        Ok((bytes, result.from_cache))
    });

    match attempt {
        Ok((bytes, from_cache)) => {
            debug!("Warmed {} ({} bytes, from_cache={})", url, bytes, from_cache);
            WarmOutcome {
                url: url.to_string(),
                source: if from_cache { "cache" } else { "network" },
                bytes,
                error: None,
            }
        }
        Err(e) => {
            warn!("Failed to warm {}: {}", url, e);
            WarmOutcome {
                url: url.to_string(),
                source: "failed",
                bytes: 0,
                error: Some(e.to_string()),
            }
        }
    }
}

fn print_table(outcomes: &[WarmOutcome]) {
    println!("{:<60} {:<8} {:>10}", "URL", "SOURCE", "SIZE");
    println!("{}", "-".repeat(80));

    for outcome in outcomes {
        let source = match outcome.source {
            "cache" => style(outcome.source).cyan().to_string(),
            "network" => style(outcome.source).green().to_string(),
            _ => style(outcome.source).red().to_string(),
        };
        let size = match &outcome.error {
            Some(e) => e.clone(),
            None => ui::format_bytes(outcome.bytes),
        };
        println!("{:<60} {:<8} {:>10}", truncate(&outcome.url, 60), source, size);
    }

    println!();
    println!("Total: {} resource(s)", outcomes.len());
}

fn print_plain(outcomes: &[WarmOutcome]) {
    for outcome in outcomes {
        println!("{}\t{}\t{}", outcome.source, outcome.bytes, outcome.url);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
