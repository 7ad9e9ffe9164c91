//! Host protocol loop for a single invocation.

use anyhow::Context;
use rph_common::{ErrorCode, ExecuteInput, ExecuteOutput, RestoreHook};
use std::io::{self, Write};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::error;

/// Largest request accepted on stdin.
const MAX_INPUT_BYTES: u64 = 10 * 1024 * 1024;

/// Read one request from stdin and answer it on stdout.
pub async fn run_hook(hook: &RestoreHook) -> anyhow::Result<()> {
    let input = read_input(tokio::io::stdin(), MAX_INPUT_BYTES).await?;

    let Some(output) = process_input(hook, &input).await? else {
        return Ok(());
    };

    let json = serde_json::to_string(&output)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", json)
        .and_then(|_| stdout.flush())
        .map_err(|e| {
            error!("[{}] {}", ErrorCode::HookOutputError.code_string(), e);
            e
        })?;
    Ok(())
}

/// Read the whole request, refusing anything over `limit` bytes.
async fn read_input<R: AsyncRead + Unpin>(reader: R, limit: u64) -> anyhow::Result<String> {
    let mut input = String::new();
    reader
        .take(limit + 1)
        .read_to_string(&mut input)
        .await
        .context("failed to read hook input")?;
    if input.len() as u64 > limit {
        error!(
            "[{}] Hook input exceeds {} bytes",
            ErrorCode::HookInvalidInput.code_string(),
            limit
        );
        anyhow::bail!("hook input exceeds the {} byte limit", limit);
    }
    Ok(input)
}

/// Handle one raw request. Empty input yields no response.
pub async fn process_input(
    hook: &RestoreHook,
    input: &str,
) -> anyhow::Result<Option<ExecuteOutput>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }

    let request: ExecuteInput = serde_json::from_str(input).map_err(|e| {
        error!(
            "[{}] Failed to parse hook input: {}",
            ErrorCode::HookInvalidInput.code_string(),
            e
        );
        anyhow::anyhow!("invalid hook input: {}", e)
    })?;

    let execution = hook.execute(request.item).await.map_err(|e| {
        error!("[{}] {}", e.code().code_string(), e);
        e
    })?;
    Ok(Some(ExecuteOutput::updated(execution.item)))
}
