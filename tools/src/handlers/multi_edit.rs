//! `multi_edit(path, edits[])` — a sequence of exact-string edits
//! applied in order, each seeing the previous edit's output. All-or-
//! nothing: since every edit is applied to an in-memory buffer, nothing
//! on disk changes until the whole sequence has succeeded, so a failure
//! partway through never needs an explicit rollback.

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
use crate::handlers::edit::apply_one;
use crate::registry::Tool;

pub struct MultiEditTool;

#[derive(Deserialize)]
struct EditSpec {
    old_string: String,
    new_string: String,
    replace_all: Option<bool>,
}

#[derive(Deserialize)]
struct MultiEditArgs {
    path: String,
    edits: Vec<EditSpec>,
}

#[async_trait]
impl Tool for MultiEditTool {
    fn info(&self) -> Info {
        Info {
            name: "multi_edit".into(),
            description: "Apply a sequence of exact-string edits to one file, atomically.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "edits": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "old_string": {"type": "string"},
                                "new_string": {"type": "string"},
                                "replace_all": {"type": "boolean"}
                            }
                        }
                    }
                }
            }),
            required: vec!["path".into(), "edits".into()],
        }
    }

    async fn run(&self, ctx: &ToolContext, call: &ToolCall) -> ToolResponse {
        match multi_edit(&ctx.sandbox, &call.input) {
            Ok(response) => response,
            Err(err) => ToolResponse::error(err.to_string()),
        }
    }
}

fn multi_edit(sandbox: &FileSandbox, input: &str) -> Result<ToolResponse, ToolError> {
    let args: MultiEditArgs = serde_json::from_str(input).map_err(|e| ToolError::InvalidArgs(e.to_string()))?;
    sandbox.validate_for(Operation::Edit, &args.path, None)?;

    let now = Utc::now();
    let mut working = sandbox.safe_read(&args.path, now)?;

    for (index, edit) in args.edits.iter().enumerate() {
        let ordinal = index + 1;
        working = apply_one(&working, &edit.old_string, &edit.new_string, edit.replace_all.unwrap_or(false))
            .map_err(|e| ToolError::Other(format!("edit {ordinal} failed: {e}")))?;
    }

    let abs = sandbox.secure_resolve(&args.path)?;
    std::fs::write(&abs, &working)?;
    sandbox.record_read(&abs, Utc::now());

    Ok(ToolResponse::ok_with_metadata(
        format!("applied {} edits to {}", args.edits.len(), args.path),
        json!({"edits_applied": args.edits.len()}),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sequential_edits_see_prior_output() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), "one two three").expect("write");
        let sandbox = FileSandbox::new(dir.path()).expect("sandbox");
        sandbox.safe_read("a.txt", Utc::now()).expect("prime read");

        let input = r#"{"path":"a.txt","edits":[
            {"old_string":"one","new_string":"1"},
            {"old_string":"1 two","new_string":"1 2"}
        ]}"#;
        let response = multi_edit(&sandbox, input).expect("edits");
        assert!(!response.is_error);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).expect("read"), "1 2 three");
    }

    #[test]
    fn failing_edit_leaves_file_untouched() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), "one two three").expect("write");
        let sandbox = FileSandbox::new(dir.path()).expect("sandbox");
        sandbox.safe_read("a.txt", Utc::now()).expect("prime read");

        let input = r#"{"path":"a.txt","edits":[
            {"old_string":"one","new_string":"1"},
            {"old_string":"nonexistent","new_string":"x"}
        ]}"#;
        let err = multi_edit(&sandbox, input).unwrap_err();
        assert!(err.to_string().contains("edit 2 failed"));
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).expect("read"), "one two three");
    }
}
