//! Session: the conversation container and forest-node that subagent
//! sessions hang off of.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub parent: Option<String>,
    pub title: String,
    pub message_count: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost: f64,
    pub summary_message_id: Option<String>,
    pub project_id: Option<String>,
    pub root_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new root session (no parent).
    pub fn new_root(id: impl Into<String>, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        let id = id.into();
        Self {
            id: id.clone(),
            parent: None,
            title: title.into(),
            message_count: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            cost: 0.0,
            summary_message_id: None,
            project_id: None,
            root_session_id: Some(id),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a subagent session rooted under `parent`.
    pub fn new_child(id: impl Into<String>, parent: &Session, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            parent: Some(parent.id.clone()),
            title: title.into(),
            message_count: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            cost: 0.0,
            summary_message_id: None,
            project_id: parent.project_id.clone(),
            root_session_id: parent.root_session_id.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn record_usage(&mut self, prompt_tokens: u64, completion_tokens: u64, cost: f64, now: DateTime<Utc>) {
        self.prompt_tokens += prompt_tokens;
        self.completion_tokens += completion_tokens;
        self.cost += cost;
        self.updated_at = now;
    }

    pub fn record_message(&mut self, now: DateTime<Utc>) {
        self.message_count += 1;
        self.updated_at = now;
    }

    pub fn set_summary(&mut self, summary_message_id: impl Into<String>, now: DateTime<Utc>) {
        self.summary_message_id = Some(summary_message_id.into());
        self.updated_at = now;
    }
}
