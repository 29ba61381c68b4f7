//! Interactive prompts with CI/non-interactive fallback

use super::context::UiContext;
use crate::error::{NetfetchError, NetfetchResult};

/// Prompt for confirmation, returns default if non-interactive or auto-yes
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> NetfetchResult<bool> {
    // Auto-yes mode bypasses prompts
    if ctx.auto_yes() {
        eprintln!("  {} (auto-approved)", message);
        return Ok(true);
    }

    // Non-interactive mode returns default
    if !ctx.is_interactive() {
        return Ok(default);
    }

    // Run blocking cliclack prompt in spawn_blocking
    let message = message.to_string();
    let result = tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message)
            .initial_value(default)
            .interact()
    })
    .await
    .map_err(|e| NetfetchError::User(format!("Prompt task failed: {}", e)))?;

    result.map_err(|e| NetfetchError::User(format!("Prompt failed: {}", e)))
}
