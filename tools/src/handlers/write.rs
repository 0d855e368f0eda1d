//! `write(path, content)` — atomic replace of a sandboxed file, subject
//! to the read-before-write staleness check.

use async_trait::async_trait;
use chrono::Utc;
use hive_sandbox::FileSandbox;
use hive_sandbox::Operation;
use serde::Deserialize;
use serde_json::json;

use crate::context::Info;
use crate::context::ToolCall;
use crate::context::ToolContext;
use crate::context::ToolResponse;
use crate::error::ToolError;
use crate::registry::Tool;

pub struct WriteTool;

#[derive(Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
}

#[async_trait]
impl Tool for WriteTool {
    fn info(&self) -> Info {
        Info {
            name: "write".into(),
            description: "Write a file in the sandbox, replacing its full contents.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "content": {"type": "string"}
                }
            }),
            required: vec!["path".into(), "content".into()],
        }
    }

    async fn run(&self, ctx: &ToolContext, call: &ToolCall) -> ToolResponse {
        match write(&ctx.sandbox, &call.input) {
            Ok(response) => response,
            Err(err) => ToolResponse::error(err.to_string()),
        }
    }
}

fn write(sandbox: &FileSandbox, input: &str) -> Result<ToolResponse, ToolError> {
    let args: WriteArgs = serde_json::from_str(input).map_err(|e| ToolError::InvalidArgs(e.to_string()))?;
    sandbox.validate_for(Operation::Write, &args.path, None)?;

    let abs = sandbox.secure_resolve(&args.path)?;
    if let Some(parent) = abs.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(&abs, &args.content)?;
    sandbox.record_read(&abs, Utc::now());

    Ok(ToolResponse::ok_with_metadata(
        format!("wrote {} bytes to {}", args.content.len(), args.path),
        json!({"bytes_written": args.content.len()}),
    ))
}
