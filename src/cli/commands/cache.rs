//! Cache command - inspect and clear the disk cache

use crate::cache::{CachedResponse, DiskCache};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::client::FetchClient;
use crate::config::Config;
use crate::error::{NetfetchError, NetfetchResult};
use crate::ui::{self, UiContext};
use chrono::Utc;
use console::style;
use serde::Serialize;
use std::sync::Arc;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> NetfetchResult<()> {
    let ctx = UiContext::detect();
    let client = FetchClient::from_config(config);

    let Some(cache) = client.cache().cloned() else {
        ui::step_warn_hint(
            &ctx,
            "Disk cache is disabled",
            "Set [cache] enabled = true in the config file",
        );
        return Ok(());
    };

    let result = match args.action {
        CacheAction::Info => show_info(&cache),
        CacheAction::List { format } => list_entries(&cache, format),
        CacheAction::Clear { yes } => clear_cache(&ctx, &cache, yes).await,
    };

    client.shutdown();
    result
}

fn show_info(cache: &DiskCache) -> NetfetchResult<()> {
    let used = cache.size();
    let max = cache.max_size();
    let percent = if max == 0 {
        0.0
    } else {
        used as f64 * 100.0 / max as f64
    };

    println!("{}", style("Disk cache").bold());
    println!("  Directory: {}", cache.directory().display());
    println!("  Entries:   {}", cache.len());
    println!(
        "  Size:      {} of {} ({:.1}%)",
        ui::format_bytes(used),
        ui::format_bytes(max),
        percent
    );
    Ok(())
}

fn list_entries(cache: &DiskCache, format: OutputFormat) -> NetfetchResult<()> {
    let entries = cache
        .entries()
        .map_err(|e| NetfetchError::io("listing cache entries", e))?;

    if entries.is_empty() {
        println!("No cached entries.");
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_entry_table(&entries),
        OutputFormat::Json => print_entry_json(&entries)?,
        OutputFormat::Plain => print_entry_plain(&entries),
    }

    Ok(())
}

fn print_entry_table(entries: &[CachedResponse]) {
    let now = Utc::now();
    println!(
        "{:<56} {:<6} {:>10} {:<6} {:<16}",
        "URL", "STATUS", "SIZE", "STATE", "LAST USED"
    );
    println!("{}", "-".repeat(98));

    for entry in entries {
        let state = if entry.is_fresh(now) {
            style("fresh").green().to_string()
        } else {
            style("stale").yellow().to_string()
        };
        let last_used = entry.last_used_at.format("%Y-%m-%d %H:%M").to_string();

        println!(
            "{:<56} {:<6} {:>10} {:<6} {:<16}",
            entry.url,
            entry.status,
            ui::format_bytes(entry.size_bytes),
            state,
            last_used
        );
    }

    println!();
    println!("Total: {} entr(ies)", entries.len());
}

fn print_entry_json(entries: &[CachedResponse]) -> NetfetchResult<()> {
    #[derive(Serialize)]
    struct EntryJson<'a> {
        url: &'a str,
        status: u16,
        size_bytes: u64,
        fresh: bool,
        received_at: String,
        last_used_at: String,
    }

    let now = Utc::now();
    let json_entries: Vec<EntryJson<'_>> = entries
        .iter()
        .map(|e| EntryJson {
            url: &e.url,
            status: e.status,
            size_bytes: e.size_bytes,
            fresh: e.is_fresh(now),
            received_at: e.received_at.to_rfc3339(),
            last_used_at: e.last_used_at.to_rfc3339(),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json_entries)?);
    Ok(())
}

fn print_entry_plain(entries: &[CachedResponse]) {
    for entry in entries {
        println!("{}", entry.url);
    }
}

/// Remove every entry, after confirmation
async fn clear_cache(ctx: &UiContext, cache: &Arc<DiskCache>, yes: bool) -> NetfetchResult<()> {
    let count = cache.len();
    if count == 0 {
        println!("No cached entries to clear.");
        return Ok(());
    }

    let ctx = ctx.clone().with_auto_yes(yes);
    let prompt = format!(
        "Remove {} cached entr(ies) ({})?",
        count,
        ui::format_bytes(cache.size())
    );
    if !ui::confirm(&ctx, &prompt, false).await? {
        ui::remark(&ctx, "Aborted.");
        return Ok(());
    }

    cache
        .clear()
        .map_err(|e| NetfetchError::io(format!("clearing {}", cache.directory().display()), e))?;

    ui::step_ok(&ctx, &format!("Cleared {} cached entr(ies)", count));
    Ok(())
}
