//! `ls(path?, ignore?, limit?)` — ignore-aware directory listing.

use async_trait::async_trait;
use hive_sandbox::FileSandbox;
use serde::Deserialize;
use serde_json::json;

use crate::context::Info;
use crate::context::ToolCall;
use crate::context::ToolContext;
use crate::context::ToolResponse;
use crate::error::ToolError;
use crate::registry::Tool;

const DEFAULT_LIMIT: usize = 500;

pub struct LsTool;

#[derive(Deserialize)]
struct LsArgs {
    path: Option<String>,
    #[serde(default)]
    ignore: Vec<String>,
    limit: Option<usize>,
}

#[async_trait]
impl Tool for LsTool {
    fn info(&self) -> Info {
        Info {
            name: "ls".into(),
            description: "List directory entries in the sandbox.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "ignore": {"type": "array", "items": {"type": "string"}},
                    "limit": {"type": "integer"}
                }
            }),
            required: vec![],
        }
    }

    async fn run(&self, ctx: &ToolContext, call: &ToolCall) -> ToolResponse {
        match ls(&ctx.sandbox, &call.input) {
            Ok(response) => response,
            Err(err) => ToolResponse::error(err.to_string()),
        }
    }
}

fn ls(sandbox: &FileSandbox, input: &str) -> Result<ToolResponse, ToolError> {
    let args: LsArgs = serde_json::from_str(input).map_err(|e| ToolError::InvalidArgs(e.to_string()))?;
    let path = args.path.unwrap_or_else(|| ".".to_string());
    let limit = args.limit.unwrap_or(DEFAULT_LIMIT);
    let (entries, truncated) = sandbox.list(&path, &args.ignore, limit)?;

    let mut content = entries.join("\n");
    if truncated {
        content.push_str("\n[results truncated]");
    }

    Ok(ToolResponse::ok_with_metadata(content, json!({"count": entries.len(), "truncated": truncated})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lists_files_at_root() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), "").expect("write");
        let sandbox = FileSandbox::new(dir.path()).expect("sandbox");
        let response = ls(&sandbox, "{}").expect("lists");
        assert!(response.content.contains("a.txt"));
    }
}
