//! Terminal output for the netfetch CLI
//!
//! Uses `cliclack` for status lines and prompts and `indicatif` for transfer
//! progress, with plain stderr output in CI/non-interactive environments.
//!
//! # Example
//!
//! ```rust,ignore
//! use netfetch::ui::{self, UiContext, DownloadProgress};
//!
//! let ctx = UiContext::detect();
//! let progress = DownloadProgress::new(&ctx, "index.json", result.content_length);
//! std::io::copy(&mut progress.wrap(result), &mut out)?;
//! progress.finish();
//!
//! ui::step_ok_detail(&ctx, "Fetched index.json", "cache");
//! ```

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{
    format_bytes, remark, step_error_detail, step_ok, step_ok_detail, step_warn, step_warn_hint,
};
pub use progress::{describe_transfer, DownloadProgress, ProgressReader, TaskSpinner};
pub use prompts::confirm;
