//! The uniform event taxonomy every provider's wire format is translated
//! into, and the table-driven mapping from provider finish reasons.

use hive_protocol::FinishReason;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens, excluding any served from cache.
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cache_creation_tokens: u32,
    pub cache_read_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    ContentStart,
    ContentDelta { text: String },
    ThinkingDelta { text: String },
    ToolUseStart { id: String, name: String },
    ToolUseDelta { id: String, partial_json: String },
    ToolUseStop { id: String },
    ContentStop,
    Complete {
        finish_reason: FinishReason,
        usage: Option<TokenUsage>,
    },
    Error { message: String },
    Warning { message: String },
}

/// Map a provider's raw `stop_reason`/`finish_reason` string onto the
/// shared message finish taxonomy. Unrecognized values map to `Unknown`
/// rather than failing the stream.
pub fn map_finish_reason(raw: &str) -> FinishReason {
    match raw {
        "end_turn" | "stop" | "stop_sequence" => FinishReason::EndTurn,
        "max_tokens" | "length" => FinishReason::MaxTokens,
        "tool_use" | "tool_calls" | "function_call" => FinishReason::ToolUse,
        "cancelled" | "canceled" => FinishReason::Canceled,
        "error" => FinishReason::Error,
        _ => FinishReason::Unknown,
    }
}
