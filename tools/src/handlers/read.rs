//! `read(path, offset?, limit?)` — line-numbered slice of a sandboxed
//! file, recording the read for the write/edit staleness check.

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

const DEFAULT_LIMIT: usize = 2000;

pub struct ReadTool;

#[derive(Deserialize)]
struct ReadArgs {
    path: String,
    offset: Option<usize>,
    limit: Option<usize>,
}

#[async_trait]
impl Tool for ReadTool {
    fn info(&self) -> Info {
        Info {
            name: "read".into(),
            description: "Read a file from the sandbox, optionally a line range.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Path relative to the sandbox root"},
                    "offset": {"type": "integer", "description": "0-based starting line"},
                    "limit": {"type": "integer", "description": "Maximum number of lines to return"}
                }
            }),
            required: vec!["path".into()],
        }
    }

    async fn run(&self, ctx: &ToolContext, call: &ToolCall) -> ToolResponse {
        match read(&ctx.sandbox, &call.input) {
            Ok(response) => response,
            Err(err) => ToolResponse::error(err.to_string()),
        }
    }
}

fn read(sandbox: &FileSandbox, input: &str) -> Result<ToolResponse, ToolError> {
    let args: ReadArgs = serde_json::from_str(input).map_err(|e| ToolError::InvalidArgs(e.to_string()))?;
    sandbox.validate_for(Operation::Read, &args.path, None)?;

    let offset = args.offset.unwrap_or(0);
    let limit = args.limit.unwrap_or(DEFAULT_LIMIT);
    let (lines, total_lines) = sandbox.read_with_limit(&args.path, offset, limit, Utc::now())?;

    let numbered = lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>6}\t{line}", offset + i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(ToolResponse::ok_with_metadata(numbered, json!({"total_lines": total_lines})))
}
