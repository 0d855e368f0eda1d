//! Message and Part data model.
//!
//! A [`Message`] is append-only: parts are added through typed methods
//! that merge streaming deltas into the trailing part of the same kind,
//! and once [`Message::finalize`] has recorded a [`FinishReason`] no
//! further part may be appended — the type itself enforces the invariant
//! that nothing is observable after a message's `Finish` marker.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolResultType {
    Text,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    EndTurn,
    MaxTokens,
    ToolUse,
    Canceled,
    Error,
    PermissionDenied,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text {
        text: String,
    },
    Reasoning {
        thinking: String,
    },
    ImageUrl {
        url: String,
        detail: Option<String>,
    },
    Binary {
        mime: String,
        /// Base64-encoded payload; kept as a plain string so the part
        /// round-trips through JSON without a custom serde adapter.
        bytes: String,
    },
    ToolCall {
        id: String,
        name: String,
        /// Raw JSON string; the tool runtime parses and validates it.
        input: String,
        finished: bool,
    },
    ToolResult {
        tool_call_id: String,
        name: String,
        #[serde(rename = "type")]
        result_type: ToolResultType,
        content: String,
        is_error: bool,
    },
    Finish {
        reason: FinishReason,
        time: DateTime<Utc>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("message {0} is already finished; no further parts may be appended")]
    AlreadyFinished(String),
    #[error("no open tool call with id {0} to append to or finish")]
    UnknownToolCall(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    parts: Vec<Part>,
}

impl Message {
    pub fn new(id: impl Into<String>, session_id: impl Into<String>, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            role,
            created_at: now,
            updated_at: now,
            finished_at: None,
            parts: Vec::new(),
        }
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.parts.iter().find_map(|p| match p {
            Part::Finish { reason, .. } => Some(*reason),
            _ => None,
        })
    }

    fn guard_open(&self) -> Result<(), MessageError> {
        if self.is_finished() {
            return Err(MessageError::AlreadyFinished(self.id.clone()));
        }
        Ok(())
    }

    /// Append a text delta, coalescing with the trailing `Text` part of
    /// this message if there is one.
    pub fn append_text_delta(&mut self, delta: &str, now: DateTime<Utc>) -> Result<(), MessageError> {
        self.guard_open()?;
        if let Some(Part::Text { text }) = self.parts.last_mut() {
            text.push_str(delta);
        } else {
            self.parts.push(Part::Text {
                text: delta.to_string(),
            });
        }
        self.updated_at = now;
        Ok(())
    }

    /// Append a reasoning delta, coalescing with the trailing `Reasoning`
    /// part of this message if there is one.
    pub fn append_reasoning_delta(&mut self, delta: &str, now: DateTime<Utc>) -> Result<(), MessageError> {
        self.guard_open()?;
        if let Some(Part::Reasoning { thinking }) = self.parts.last_mut() {
            thinking.push_str(delta);
        } else {
            self.parts.push(Part::Reasoning {
                thinking: delta.to_string(),
            });
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn append_image_url(&mut self, url: String, detail: Option<String>, now: DateTime<Utc>) -> Result<(), MessageError> {
        self.guard_open()?;
        self.parts.push(Part::ImageUrl { url, detail });
        self.updated_at = now;
        Ok(())
    }

    pub fn append_binary(&mut self, mime: String, bytes_base64: String, now: DateTime<Utc>) -> Result<(), MessageError> {
        self.guard_open()?;
        self.parts.push(Part::Binary {
            mime,
            bytes: bytes_base64,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Start a new tool call, or append to it by id if one with a matching
    /// id is already open (streaming input deltas arrive incrementally).
    pub fn start_or_append_tool_call(
        &mut self,
        id: &str,
        name: &str,
        input_delta: &str,
        now: DateTime<Utc>,
    ) -> Result<(), MessageError> {
        self.guard_open()?;
        if let Some(Part::ToolCall {
            id: existing_id,
            input,
            finished,
            ..
        }) = self.parts.iter_mut().rev().find(|p| matches!(p, Part::ToolCall { id: i, .. } if i == id))
        {
            debug_assert_eq!(existing_id, id);
            if !*finished {
                input.push_str(input_delta);
            }
        } else {
            self.parts.push(Part::ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                input: input_delta.to_string(),
                finished: false,
            });
        }
        self.updated_at = now;
        Ok(())
    }

    /// Mark a tool call's input as complete; no further deltas will merge
    /// into it even if one arrives late.
    pub fn finish_tool_call(&mut self, id: &str, now: DateTime<Utc>) -> Result<(), MessageError> {
        self.guard_open()?;
        let call = self
            .parts
            .iter_mut()
            .find(|p| matches!(p, Part::ToolCall { id: i, .. } if i == id))
            .ok_or_else(|| MessageError::UnknownToolCall(id.to_string()))?;
        if let Part::ToolCall { finished, .. } = call {
            *finished = true;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Returns the ids of tool calls in this message that are finished but
    /// have no paired `ToolResult` yet, in issue order.
    pub fn pending_tool_calls(&self) -> Vec<(&str, &str, &str)> {
        let mut results = std::collections::HashSet::new();
        for part in &self.parts {
            if let Part::ToolResult { tool_call_id, .. } = part {
                results.insert(tool_call_id.as_str());
            }
        }
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolCall {
                    id,
                    name,
                    input,
                    finished: true,
                } if !results.contains(id.as_str()) => Some((id.as_str(), name.as_str(), input.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn append_tool_result(
        &mut self,
        tool_call_id: String,
        name: String,
        result_type: ToolResultType,
        content: String,
        is_error: bool,
        now: DateTime<Utc>,
    ) -> Result<(), MessageError> {
        self.guard_open()?;
        self.parts.push(Part::ToolResult {
            tool_call_id,
            name,
            result_type,
            content,
            is_error,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Terminal marker. Idempotent in the sense that calling it twice is
    /// rejected by `guard_open`, preserving "at most one Finish per message".
    pub fn finalize(&mut self, reason: FinishReason, now: DateTime<Utc>) -> Result<(), MessageError> {
        self.guard_open()?;
        self.parts.push(Part::Finish { reason, time: now });
        self.updated_at = now;
        self.finished_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn msg() -> Message {
        Message::new("m1", "s1", Role::Assistant, now())
    }

    #[test]
    fn text_deltas_coalesce() {
        let mut m = msg();
        m.append_text_delta("Hello, ", now()).expect("ok");
        m.append_text_delta("world", now()).expect("ok");
        assert_eq!(m.parts().len(), 1);
        match &m.parts()[0] {
            Part::Text { text } => assert_eq!(text, "Hello, world"),
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[test]
    fn text_then_reasoning_does_not_merge_across_kinds() {
        let mut m = msg();
        m.append_text_delta("a", now()).expect("ok");
        m.append_reasoning_delta("b", now()).expect("ok");
        m.append_text_delta("c", now()).expect("ok");
        assert_eq!(m.parts().len(), 3);
    }

    #[test]
    fn tool_call_deltas_merge_by_id() {
        let mut m = msg();
        m.start_or_append_tool_call("call_1", "read", "{\"path\":", now()).expect("ok");
        m.start_or_append_tool_call("call_1", "read", "\"a.txt\"}", now()).expect("ok");
        m.finish_tool_call("call_1", now()).expect("ok");
        assert_eq!(m.parts().len(), 1);
        match &m.parts()[0] {
            Part::ToolCall { input, finished, .. } => {
                assert_eq!(input, "{\"path\":\"a.txt\"}");
                assert!(*finished);
            }
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[test]
    fn finalize_then_append_is_rejected() {
        let mut m = msg();
        m.append_text_delta("hi", now()).expect("ok");
        m.finalize(FinishReason::EndTurn, now()).expect("ok");
        let err = m.append_text_delta("more", now()).unwrap_err();
        assert!(matches!(err, MessageError::AlreadyFinished(_)));
        // Invariant: nothing observable was appended after Finish.
        assert_eq!(m.parts().len(), 2);
    }

    #[test]
    fn finalize_twice_is_rejected() {
        let mut m = msg();
        m.finalize(FinishReason::EndTurn, now()).expect("ok");
        let err = m.finalize(FinishReason::Error, now()).unwrap_err();
        assert!(matches!(err, MessageError::AlreadyFinished(_)));
        assert_eq!(m.finish_reason(), Some(FinishReason::EndTurn));
    }

    #[test]
    fn pending_tool_calls_excludes_results_already_paired() {
        let mut m = msg();
        m.start_or_append_tool_call("c1", "read", "{}", now()).expect("ok");
        m.finish_tool_call("c1", now()).expect("ok");
        m.start_or_append_tool_call("c2", "write", "{}", now()).expect("ok");
        m.finish_tool_call("c2", now()).expect("ok");
        m.append_tool_result("c1".into(), "read".into(), ToolResultType::Text, "ok".into(), false, now())
            .expect("ok");

        let pending = m.pending_tool_calls();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].0, "c2");
    }

    #[test]
    fn unfinished_tool_call_is_not_pending() {
        let mut m = msg();
        m.start_or_append_tool_call("c1", "read", "{}", now()).expect("ok");
        assert!(m.pending_tool_calls().is_empty());
    }
}
