//! `bash(command, timeout?)` — runs a command through the configured
//! shell (permission-gated upstream of the tool runtime; see
//! `hive-permission`'s pattern rules).

use std::time::Duration;

use async_trait::async_trait;
use hive_protocol::config::ShellConfig;
use serde::Deserialize;
use serde_json::json;
use tokio::process::Command;

use crate::context::Info;
use crate::context::ToolCall;
use crate::context::ToolContext;
use crate::context::ToolResponse;
use crate::error::ToolError;
use crate::registry::Tool;

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_SHELL: &str = "/bin/sh";

pub struct BashTool;

#[derive(Deserialize)]
struct BashArgs {
    command: String,
    timeout: Option<u64>,
}

#[async_trait]
impl Tool for BashTool {
    fn info(&self) -> Info {
        Info {
            name: "bash".into(),
            description: "Run a shell command through the configured shell.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string"},
                    "timeout": {"type": "integer"}
                }
            }),
            required: vec!["command".into()],
        }
    }

    async fn run(&self, ctx: &ToolContext, call: &ToolCall) -> ToolResponse {
        match bash(&ctx.shell, &call.input).await {
            Ok(response) => response,
            Err(err) => ToolResponse::error(err.to_string()),
        }
    }
}

async fn bash(shell: &ShellConfig, input: &str) -> Result<ToolResponse, ToolError> {
    let args: BashArgs = serde_json::from_str(input).map_err(|e| ToolError::InvalidArgs(e.to_string()))?;
    let timeout = Duration::from_secs(args.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS));

    let shell_path = shell.path.as_deref().unwrap_or(DEFAULT_SHELL);
    let mut cmd = Command::new(shell_path);
    if shell.args.is_empty() {
        cmd.arg("-c");
    } else {
        cmd.args(&shell.args);
    }
    cmd.arg(&args.command);
    cmd.kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| ToolError::Other(format!("command timed out after {}s", timeout.as_secs())))??;

    let mut content = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.stderr.is_empty() {
        content.push_str("\n--- stderr ---\n");
        content.push_str(&String::from_utf8_lossy(&output.stderr));
    }

    let is_error = !output.status.success();
    let metadata = json!({"exit_code": output.status.code()});
    Ok(ToolResponse {
        content,
        metadata: Some(metadata),
        is_error,
        kind: crate::context::ToolResponseKind::Text,
    })
}
