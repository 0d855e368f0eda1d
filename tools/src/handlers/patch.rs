//! `patch(patch_text)` — applies a `*** Begin Patch` envelope via
//! `hive_apply_patch`, rooted at the sandbox so every touched path still
//! goes through the traversal guard.

use async_trait::async_trait;
use hive_apply_patch::apply_patch;
use hive_sandbox::FileSandbox;
use serde::Deserialize;
use serde_json::json;

use crate::context::Info;
use crate::context::ToolCall;
use crate::context::ToolContext;
use crate::context::ToolResponse;
use crate::error::ToolError;
use crate::registry::Tool;

pub struct PatchTool;

#[derive(Deserialize)]
struct PatchArgs {
    patch_text: String,
}

#[async_trait]
impl Tool for PatchTool {
    fn info(&self) -> Info {
        Info {
            name: "patch".into(),
            description: "Apply a Begin Patch/End Patch envelope with Add/Update/Delete file directives.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"patch_text": {"type": "string"}}
            }),
            required: vec!["patch_text".into()],
        }
    }

    async fn run(&self, ctx: &ToolContext, call: &ToolCall) -> ToolResponse {
        match patch(&ctx.sandbox, &call.input) {
            Ok(response) => response,
            Err(err) => ToolResponse::error(err.to_string()),
        }
    }
}

fn patch(sandbox: &FileSandbox, input: &str) -> Result<ToolResponse, ToolError> {
    let args: PatchArgs = serde_json::from_str(input).map_err(|e| ToolError::InvalidArgs(e.to_string()))?;
    let affected = apply_patch(&args.patch_text, sandbox.root())?;

    let summary = format!(
        "added {} file(s), modified {} file(s), deleted {} file(s)",
        affected.added.len(),
        affected.modified.len(),
        affected.deleted.len()
    );
    Ok(ToolResponse::ok_with_metadata(
        summary,
        json!({
            "added": affected.added.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
            "modified": affected.modified.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
            "deleted": affected.deleted.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        }),
    ))
}
