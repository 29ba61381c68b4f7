//! Get command - fetch a single resource

use crate::cli::args::GetArgs;
use crate::client::FetchClient;
use crate::config::Config;
use crate::error::{NetfetchError, NetfetchResult};
use crate::policy::NetworkPolicy;
use crate::ui::{self, DownloadProgress, UiContext};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::debug;
use url::Url;

/// Outcome of a completed transfer
struct Transfer {
    bytes: u64,
    from_cache: bool,
}

/// Execute the get command
pub async fn execute(args: GetArgs, config: &Config) -> NetfetchResult<()> {
    let ctx = UiContext::detect();
    let client = FetchClient::from_config(config);
    let policy = args.policy.policy();

    let url = args.url.clone();
    let output = args.output.clone();
    let task_ctx = ctx.clone();
    let transfer = tokio::task::spawn_blocking(move || {
        let result = fetch(&client, &url, policy, output.as_deref(), &task_ctx);
        client.shutdown();
        result
    })
    .await
    .map_err(|e| NetfetchError::User(format!("Fetch task failed: {}", e)))??;

    let label = match &args.output {
        Some(path) => format!("Saved {}", path.display()),
        None => format!("Fetched {}", args.url),
    };
    ui::step_ok_detail(
        &ctx,
        &label,
        &ui::describe_transfer(transfer.bytes, transfer.from_cache),
    );

    Ok(())
}

fn fetch(
    client: &FetchClient,
    url: &Url,
    policy: NetworkPolicy,
    output: Option<&Path>,
    ctx: &UiContext,
) -> NetfetchResult<Transfer> {
    let result = client.load(url, policy)?;
    let from_cache = result.from_cache;
    debug!(
        "Loaded {} (from_cache={}, length={:?})",
        url, from_cache, result.content_length
    );

    let progress = DownloadProgress::new(ctx, &display_name(url), result.content_length);
    let mut reader = progress.wrap(result);

    let bytes = match output {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| NetfetchError::io(format!("creating {}", path.display()), e))?;
            let mut writer = BufWriter::new(file);
            let bytes = copy_body(&mut reader, &mut writer, url)?;
            writer
                .flush()
                .map_err(|e| NetfetchError::io(format!("writing {}", path.display()), e))?;
            bytes
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            let bytes = copy_body(&mut reader, &mut writer, url)?;
            writer
                .flush()
                .map_err(|e| NetfetchError::io("writing to stdout", e))?;
            bytes
        }
    };
    progress.finish();

    Ok(Transfer { bytes, from_cache })
}

fn copy_body(reader: &mut impl io::Read, writer: &mut impl Write, url: &Url) -> NetfetchResult<u64> {
    io::copy(reader, writer).map_err(|e| NetfetchError::io(format!("reading body of {}", url), e))
}

/// Last path segment of a URL, or its host
fn display_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| url.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}
