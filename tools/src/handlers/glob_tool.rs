//! `glob(pattern, limit?)` — doublestar pattern match across the
//! sandbox, respecting the shared ignore rules.

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

const DEFAULT_LIMIT: usize = 200;

pub struct GlobTool;

#[derive(Deserialize)]
struct GlobArgs {
    pattern: String,
    limit: Option<usize>,
}

#[async_trait]
impl Tool for GlobTool {
    fn info(&self) -> Info {
        Info {
            name: "glob".into(),
            description: "Find files in the sandbox matching a doublestar glob pattern.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "pattern": {"type": "string"},
                    "limit": {"type": "integer"}
                }
            }),
            required: vec!["pattern".into()],
        }
    }

    async fn run(&self, ctx: &ToolContext, call: &ToolCall) -> ToolResponse {
        match glob(&ctx.sandbox, &call.input) {
            Ok(response) => response,
            Err(err) => ToolResponse::error(err.to_string()),
        }
    }
}

fn glob(sandbox: &FileSandbox, input: &str) -> Result<ToolResponse, ToolError> {
    let args: GlobArgs = serde_json::from_str(input).map_err(|e| ToolError::InvalidArgs(e.to_string()))?;
    let limit = args.limit.unwrap_or(DEFAULT_LIMIT);
    let (paths, truncated) = sandbox.glob(&args.pattern, limit)?;

    let mut content = paths.join("\n");
    if truncated {
        content.push_str("\n[results truncated]");
    }

    Ok(ToolResponse::ok_with_metadata(content, json!({"count": paths.len(), "truncated": truncated})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn finds_matching_files() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.rs"), "").expect("write");
        std::fs::write(dir.path().join("b.txt"), "").expect("write");
        let sandbox = FileSandbox::new(dir.path()).expect("sandbox");
        let response = glob(&sandbox, r#"{"pattern":"*.rs"}"#).expect("globs");
        assert_eq!(response.content, "a.rs");
    }
}
