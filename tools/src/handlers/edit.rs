//! `edit(path, old_string, new_string, replace_all?)` — exact-string
//! substitution against a read-before-written file.

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

pub struct EditTool;

#[derive(Deserialize)]
struct EditArgs {
    path: String,
    old_string: String,
    new_string: String,
    replace_all: Option<bool>,
}

#[async_trait]
impl Tool for EditTool {
    fn info(&self) -> Info {
        Info {
            name: "edit".into(),
            description: "Replace an exact string occurrence in a sandboxed file.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "old_string": {"type": "string"},
                    "new_string": {"type": "string"},
                    "replace_all": {"type": "boolean"}
                }
            }),
            required: vec!["path".into(), "old_string".into(), "new_string".into()],
        }
    }

    async fn run(&self, ctx: &ToolContext, call: &ToolCall) -> ToolResponse {
        match edit(&ctx.sandbox, &call.input) {
            Ok(response) => response,
            Err(err) => ToolResponse::error(err.to_string()),
        }
    }
}

/// Apply a single exact-string substitution to `original`, enforcing the
/// "found exactly once unless `replace_all`" rule. Shared with
/// `multi_edit`, which chains this over a sequence of edits in memory
/// before committing anything to disk.
pub(crate) fn apply_one(original: &str, old: &str, new: &str, replace_all: bool) -> Result<String, ToolError> {
    let occurrences = original.matches(old).count();
    if occurrences == 0 {
        return Err(ToolError::Other(format!("old_string not found: {old:?}")));
    }
    if occurrences > 1 && !replace_all {
        return Err(ToolError::Other(format!(
            "old_string occurs {occurrences} times; pass replace_all=true or supply more context"
        )));
    }
    Ok(if replace_all {
        original.replace(old, new)
    } else {
        original.replacen(old, new, 1)
    })
}

fn edit(sandbox: &FileSandbox, input: &str) -> Result<ToolResponse, ToolError> {
    let args: EditArgs = serde_json::from_str(input).map_err(|e| ToolError::InvalidArgs(e.to_string()))?;
    sandbox.validate_for(Operation::Edit, &args.path, None)?;

    let now = Utc::now();
    let original = sandbox.safe_read(&args.path, now)?;
    let replace_all = args.replace_all.unwrap_or(false);
    let occurrences = original.matches(args.old_string.as_str()).count();
    let updated = apply_one(&original, &args.old_string, &args.new_string, replace_all)?;

    let abs = sandbox.secure_resolve(&args.path)?;
    std::fs::write(&abs, &updated)?;
    sandbox.record_read(&abs, Utc::now());

    Ok(ToolResponse::ok_with_metadata(
        format!("replaced {occurrences} occurrence(s) in {}", args.path),
        json!({"occurrences": occurrences}),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn replaces_single_occurrence_after_read() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), "hello world").expect("write");
        let sandbox = FileSandbox::new(dir.path()).expect("sandbox");
        sandbox.safe_read("a.txt", Utc::now()).expect("prime read");

        let response = edit(&sandbox, r#"{"path":"a.txt","old_string":"world","new_string":"there"}"#).expect("edits");
        assert!(!response.is_error);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).expect("read"), "hello there");
    }

    #[test]
    fn ambiguous_occurrence_without_replace_all_fails() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), "aa aa").expect("write");
        let sandbox = FileSandbox::new(dir.path()).expect("sandbox");
        sandbox.safe_read("a.txt", Utc::now()).expect("prime read");

        let err = edit(&sandbox, r#"{"path":"a.txt","old_string":"aa","new_string":"bb"}"#).unwrap_err();
        assert!(matches!(err, ToolError::Other(_)));
    }

    #[test]
    fn replace_all_rewrites_every_occurrence() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), "aa aa").expect("write");
        let sandbox = FileSandbox::new(dir.path()).expect("sandbox");
        sandbox.safe_read("a.txt", Utc::now()).expect("prime read");

        let response = edit(&sandbox, r#"{"path":"a.txt","old_string":"aa","new_string":"bb","replace_all":true}"#).expect("edits");
        assert!(!response.is_error);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).expect("read"), "bb bb");
    }
}
