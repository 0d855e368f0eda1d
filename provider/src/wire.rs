//! Request/response wire shapes for the single generic adapter every
//! provider speaks through: a content-block message array plus an
//! SSE stream of `message_start` / `content_block_*` / `message_delta` /
//! `message_stop` events. Provider-specific dialects are expected to be
//! translated into this shape at the HTTP boundary (headers, auth, base
//! URL) rather than by teaching this module every vendor's format.

use hive_protocol::Message;
use hive_protocol::Part;
use hive_protocol::Role;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug)]
pub struct Response {
    pub text: String,
    pub thinking: String,
    pub tool_calls: Vec<(String, String, String)>,
    pub finish_reason: hive_protocol::FinishReason,
    pub usage: Option<crate::event::TokenUsage>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            text: String::new(),
            thinking: String::new(),
            tool_calls: Vec::new(),
            finish_reason: hive_protocol::FinishReason::Unknown,
            usage: None,
        }
    }
}

pub fn build_request(model: &str, messages: &[Message], tools: &[ToolSpec], stream: bool) -> Value {
    let mut system = String::new();
    let mut wire_messages = Vec::new();

    for message in messages {
        if message.role == Role::System {
            for part in message.parts() {
                if let Part::Text { text } = part {
                    if !system.is_empty() {
                        system.push('\n');
                    }
                    system.push_str(text);
                }
            }
            continue;
        }

        let role = match message.role {
            Role::User | Role::Tool => "user",
            Role::Assistant => "assistant",
            Role::System => unreachable!("handled above"),
        };

        let content: Vec<Value> = message.parts().iter().filter_map(part_to_content_block).collect();
        if content.is_empty() {
            continue;
        }
        wire_messages.push(serde_json::json!({ "role": role, "content": content }));
    }

    let mut body = serde_json::json!({
        "model": model,
        "stream": stream,
        "messages": wire_messages,
    });
    if !system.is_empty() {
        body["system"] = Value::String(system);
    }
    if !tools.is_empty() {
        body["tools"] = serde_json::to_value(tools).unwrap_or(Value::Null);
    }
    body
}

fn part_to_content_block(part: &Part) -> Option<Value> {
    match part {
        Part::Text { text } => Some(serde_json::json!({ "type": "text", "text": text })),
        Part::Reasoning { thinking } => Some(serde_json::json!({ "type": "thinking", "thinking": thinking })),
        Part::ToolCall { id, name, input, .. } => {
            let input: Value = serde_json::from_str(input).unwrap_or(Value::Null);
            Some(serde_json::json!({ "type": "tool_use", "id": id, "name": name, "input": input }))
        }
        Part::ToolResult { tool_call_id, content, is_error, .. } => Some(serde_json::json!({
            "type": "tool_result",
            "tool_use_id": tool_call_id,
            "content": content,
            "is_error": is_error,
        })),
        Part::ImageUrl { url, .. } => Some(serde_json::json!({
            "type": "image",
            "source": { "type": "url", "url": url },
        })),
        Part::Binary { mime, bytes } => Some(serde_json::json!({
            "type": "image",
            "source": { "type": "base64", "media_type": mime, "data": bytes },
        })),
        Part::Finish { .. } => None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SseEvent {
    MessageStart {
        #[serde(default)]
        message: Value,
    },
    ContentBlockStart {
        index: usize,
        content_block: ContentBlockHeader,
    },
    ContentBlockDelta {
        index: usize,
        delta: ContentDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        #[serde(default)]
        delta: MessageDeltaBody,
        #[serde(default)]
        usage: Option<UsageBody>,
    },
    MessageStop,
    Error {
        error: ErrorBody,
    },
    Ping,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlockHeader {
    Text { #[serde(default)] text: String },
    Thinking { #[serde(default)] thinking: String },
    ToolUse { id: String, name: String },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    InputJsonDelta { partial_json: String },
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageDeltaBody {
    pub stop_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UsageBody {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
    #[serde(default)]
    pub cache_creation_input_tokens: u32,
    #[serde(default)]
    pub cache_read_input_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
