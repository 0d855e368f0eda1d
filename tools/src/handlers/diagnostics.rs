//! `wait_for_diagnostics(path)` — relay to the LSP pool's own wait
//! logic (open/notify-change, subscribe to `publishDiagnostics`, race a
//! 5s deadline); a no-op success when no LSP pool is configured for
//! this workspace.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::context::Info;
use crate::context::ToolCall;
use crate::context::ToolContext;
use crate::context::ToolResponse;
use crate::error::ToolError;
use crate::registry::Tool;

pub struct WaitForDiagnosticsTool;

#[derive(Deserialize)]
struct WaitForDiagnosticsArgs {
    path: String,
}

#[async_trait]
impl Tool for WaitForDiagnosticsTool {
    fn info(&self) -> Info {
        Info {
            name: "wait_for_diagnostics".into(),
            description: "Open or notify-change a file on every matching LSP client and wait for diagnostics.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"path": {"type": "string"}}
            }),
            required: vec!["path".into()],
        }
    }

    async fn run(&self, ctx: &ToolContext, call: &ToolCall) -> ToolResponse {
        match wait_for_diagnostics(ctx, &call.input).await {
            Ok(response) => response,
            Err(err) => ToolResponse::error(err.to_string()),
        }
    }
}

async fn wait_for_diagnostics(ctx: &ToolContext, input: &str) -> Result<ToolResponse, ToolError> {
    let args: WaitForDiagnosticsArgs = serde_json::from_str(input).map_err(|e| ToolError::InvalidArgs(e.to_string()))?;

    let Some(pool) = &ctx.lsp else {
        return Ok(ToolResponse::ok("no language servers configured for this workspace"));
    };

    let abs = ctx.sandbox.secure_resolve(&args.path)?;
    pool.notify_open(&abs).await;
    match pool.wait_for_diagnostics(&abs).await {
        Some(diagnostics) => Ok(ToolResponse::ok_with_metadata(
            format!("diagnostics for {}", args.path),
            json!({"diagnostics": diagnostics}),
        )),
        None => Ok(ToolResponse::ok(format!("no diagnostics reported for {} within the deadline", args.path))),
    }
}
