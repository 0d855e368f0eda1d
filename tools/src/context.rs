//! The shapes a `Tool` trades in: its advertised `Info`, the inbound
//! `ToolCall`, the per-invocation `ToolContext`, and the `ToolResponse`
//! it returns.

use std::sync::Arc;

use hive_protocol::config::ShellConfig;
use hive_sandbox::FileSandbox;
use hive_state::TaskStore;
use serde_json::Value;

/// Advertised shape of a tool, handed to the provider as part of the
/// tool-use request.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Info {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub required: Vec<String>,
}

/// One completed tool invocation as assembled by the agent loop from a
/// streamed `ToolUseStart`/`ToolUseDelta`/`ToolUseStop` sequence.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON-encoded arguments; each tool parses and validates its
    /// own shape rather than sharing a common args type.
    pub input: String,
}

/// Per-call context threaded down from the agent loop. Cheap to clone:
/// everything here is an `Arc` or a small value type.
#[derive(Clone)]
pub struct ToolContext {
    pub session_id: String,
    pub message_id: String,
    pub agent_id: String,
    pub is_task_agent: bool,
    pub sandbox: Arc<FileSandbox>,
    pub tasks: Arc<dyn TaskStore>,
    pub lsp: Option<Arc<hive_lsp::LspPool>>,
    pub http: reqwest::Client,
    pub shell: ShellConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolResponseKind {
    Text,
    /// Exempt from the 300k-token truncation cap.
    Image,
}

#[derive(Debug, Clone)]
pub struct ToolResponse {
    pub content: String,
    pub metadata: Option<Value>,
    pub is_error: bool,
    pub kind: ToolResponseKind,
}

impl ToolResponse {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: None,
            is_error: false,
            kind: ToolResponseKind::Text,
        }
    }

    pub fn ok_with_metadata(content: impl Into<String>, metadata: Value) -> Self {
        Self {
            content: content.into(),
            metadata: Some(metadata),
            is_error: false,
            kind: ToolResponseKind::Text,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            metadata: None,
            is_error: true,
            kind: ToolResponseKind::Text,
        }
    }

    pub fn image(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: None,
            is_error: false,
            kind: ToolResponseKind::Image,
        }
    }
}
