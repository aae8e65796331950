//! Confirmation prompt

use super::context::UiContext;
use crate::error::{PrecacheError, PrecacheResult};

/// Ask a yes/no question
///
/// `--yes` answers true. Without a terminal the default is returned.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> PrecacheResult<bool> {
    if ctx.auto_yes() {
        return Ok(true);
    }
    if !ctx.is_interactive() {
        return Ok(default);
    }

    let message = message.to_string();
    tokio::task::spawn_blocking(move || {
        cliclack::confirm(message)
            .initial_value(default)
            .interact()
    })
    .await
    .map_err(|e| PrecacheError::Internal(format!("prompt task failed: {}", e)))?
    .map_err(|e| PrecacheError::User(format!("Prompt failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn auto_yes_confirms() {
        let ctx = UiContext::non_interactive().with_auto_yes(true);
        assert!(confirm(&ctx, "Delete every cache?", false).await.unwrap());
    }

    #[tokio::test]
    async fn non_interactive_uses_default() {
        let ctx = UiContext::non_interactive();
        assert!(!confirm(&ctx, "Delete every cache?", false).await.unwrap());
        assert!(confirm(&ctx, "Delete every cache?", true).await.unwrap());
    }
}
