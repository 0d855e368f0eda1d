//! `Tool` trait and the `ToolRegistry` that dispatches by name, recovers
//! from a panicking handler, and enforces the shared truncation cap.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use crate::context::Info;
use crate::context::ToolCall;
use crate::context::ToolContext;
use crate::context::ToolResponse;
use crate::context::ToolResponseKind;

/// Tokens are approximated at 4 chars/token; content over this cap is
/// truncated with a visible marker. `Image` responses are exempt.
const MAX_TOKENS: usize = 300_000;
const CHARS_PER_TOKEN: usize = 4;
const MAX_CONTENT_CHARS: usize = MAX_TOKENS * CHARS_PER_TOKEN;

#[async_trait]
pub trait Tool: Send + Sync {
    fn info(&self) -> Info;
    async fn run(&self, ctx: &ToolContext, call: &ToolCall) -> ToolResponse;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.info().name.clone(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn infos(&self) -> Vec<Info> {
        self.tools.values().map(|tool| tool.info()).collect()
    }

    /// Look up `call.name`, run it with panic recovery, and post-process
    /// the response through the truncation cap.
    pub async fn execute(&self, ctx: &ToolContext, call: &ToolCall) -> ToolResponse {
        let Some(tool) = self.get(&call.name) else {
            return ToolResponse::error(format!("unknown tool: {}", call.name));
        };

        let response = match AssertUnwindSafe(tool.run(ctx, call)).catch_unwind().await {
            Ok(response) => response,
            Err(_) => {
                tracing::error!(tool = %call.name, "tool handler panicked");
                ToolResponse::error(format!("tool {} panicked", call.name))
            }
        };

        truncate(response)
    }
}

fn truncate(response: ToolResponse) -> ToolResponse {
    if response.kind == ToolResponseKind::Image {
        return response;
    }
    let char_count = response.content.chars().count();
    if char_count <= MAX_CONTENT_CHARS {
        return response;
    }
    let kept: String = response.content.chars().take(MAX_CONTENT_CHARS).collect();
    ToolResponse {
        content: format!("{kept}\n\n[... output truncated: {char_count} chars exceeds the {MAX_TOKENS} token cap ...]"),
        ..response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PanicTool;

    #[async_trait]
    impl Tool for PanicTool {
        fn info(&self) -> Info {
            Info {
                name: "boom".into(),
                description: "always panics".into(),
                parameters: serde_json::json!({"type": "object"}),
                required: vec![],
            }
        }

        async fn run(&self, _ctx: &ToolContext, _call: &ToolCall) -> ToolResponse {
            panic!("kaboom")
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn info(&self) -> Info {
            Info {
                name: "echo".into(),
                description: "echoes its input".into(),
                parameters: serde_json::json!({"type": "object"}),
                required: vec![],
            }
        }

        async fn run(&self, _ctx: &ToolContext, call: &ToolCall) -> ToolResponse {
            ToolResponse::ok(call.input.clone())
        }
    }

    fn test_ctx() -> ToolContext {
        let dir = tempfile::tempdir().expect("tempdir");
        let sandbox = Arc::new(hive_sandbox::FileSandbox::new(dir.path()).expect("sandbox"));
        let bus = Arc::new(hive_common::Bus::default());
        ToolContext {
            session_id: "s1".into(),
            message_id: "m1".into(),
            agent_id: "a1".into(),
            is_task_agent: false,
            sandbox,
            tasks: Arc::new(hive_state::MemoryStore::new(bus)),
            lsp: None,
            http: reqwest::Client::new(),
            shell: Default::default(),
        }
    }

    #[tokio::test]
    async fn unknown_tool_returns_error_response() {
        let registry = ToolRegistry::new();
        let ctx = test_ctx();
        let call = ToolCall { id: "1".into(), name: "nope".into(), input: "{}".into() };
        let response = registry.execute(&ctx, &call).await;
        assert!(response.is_error);
    }

    #[tokio::test]
    async fn panicking_tool_is_recovered_into_error_response() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(PanicTool));
        let ctx = test_ctx();
        let call = ToolCall { id: "1".into(), name: "boom".into(), input: "{}".into() };
        let response = registry.execute(&ctx, &call).await;
        assert!(response.is_error);
        assert!(response.content.contains("panicked"));
    }

    #[tokio::test]
    async fn oversized_text_response_is_truncated_with_marker() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let ctx = test_ctx();
        let huge = "a".repeat(MAX_CONTENT_CHARS + 10);
        let call = ToolCall { id: "1".into(), name: "echo".into(), input: huge };
        let response = registry.execute(&ctx, &call).await;
        assert!(response.content.contains("truncated"));
        assert!(response.content.len() < MAX_CONTENT_CHARS + 200);
    }

    #[tokio::test]
    async fn image_response_is_exempt_from_truncation() {
        struct ImageTool;
        #[async_trait]
        impl Tool for ImageTool {
            fn info(&self) -> Info {
                Info {
                    name: "image".into(),
                    description: "returns an oversized image payload".into(),
                    parameters: serde_json::json!({"type": "object"}),
                    required: vec![],
                }
            }
            async fn run(&self, _ctx: &ToolContext, _call: &ToolCall) -> ToolResponse {
                ToolResponse::image("x".repeat(MAX_CONTENT_CHARS + 10))
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(ImageTool));
        let ctx = test_ctx();
        let call = ToolCall { id: "1".into(), name: "image".into(), input: "{}".into() };
        let response = registry.execute(&ctx, &call).await;
        assert!(!response.content.contains("truncated"));
        assert_eq!(response.content.len(), MAX_CONTENT_CHARS + 10);
    }
}
