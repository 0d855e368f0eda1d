//! `delete(path)` — files, directories (recursive), and symlinks (the
//! link itself, never its target) with a regular-file count as
//! diff-like metadata.

use async_trait::async_trait;
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

pub struct DeleteTool;

#[derive(Deserialize)]
struct DeleteArgs {
    path: String,
}

#[async_trait]
impl Tool for DeleteTool {
    fn info(&self) -> Info {
        Info {
            name: "delete".into(),
            description: "Delete a file, directory, or symlink in the sandbox.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"path": {"type": "string"}}
            }),
            required: vec!["path".into()],
        }
    }

    async fn run(&self, ctx: &ToolContext, call: &ToolCall) -> ToolResponse {
        match delete(&ctx.sandbox, &call.input) {
            Ok(response) => response,
            Err(err) => ToolResponse::error(err.to_string()),
        }
    }
}

fn delete(sandbox: &FileSandbox, input: &str) -> Result<ToolResponse, ToolError> {
    let args: DeleteArgs = serde_json::from_str(input).map_err(|e| ToolError::InvalidArgs(e.to_string()))?;
    let validated = sandbox.validate_for(Operation::Delete, &args.path, None)?;
    let abs = validated.abs_path;

    let metadata = std::fs::symlink_metadata(&abs)?;
    let files_removed = if metadata.file_type().is_symlink() {
        std::fs::remove_file(&abs)?;
        0
    } else if metadata.is_dir() {
        let count = count_regular_files(&abs)?;
        std::fs::remove_dir_all(&abs)?;
        count
    } else {
        std::fs::remove_file(&abs)?;
        1
    };

    Ok(ToolResponse::ok_with_metadata(
        format!("deleted {}", args.path),
        json!({"files_removed": files_removed}),
    ))
}

fn count_regular_files(dir: &std::path::Path) -> std::io::Result<usize> {
    let mut count = 0;
    for entry in walkdir::WalkDir::new(dir) {
        let entry = entry.map_err(std::io::Error::other)?;
        if entry.file_type().is_file() {
            count += 1;
        }
    }
    Ok(count)
}
