//! In-memory store backend: a `DashMap` per entity kind, guarded
//! individually. Used for tests and for the default single-process
//! deployment where persistence isn't required.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use hive_common::Bus;
use hive_common::Event;
use hive_common::Topic;
use hive_protocol::Message;
use hive_protocol::Session;
use hive_protocol::Task;

use crate::error::StoreError;
use crate::traits::MessageStore;
use crate::traits::SessionStore;
use crate::traits::TaskStore;

fn publish(bus: &Bus, topic: Topic, kind: &'static str, subject_id: String) {
    bus.publish(Event {
        topic,
        kind,
        subject_id,
        payload: serde_json::Value::Null,
    });
}

pub struct MemoryStore {
    sessions: DashMap<String, Session>,
    messages: DashMap<String, Message>,
    tasks: DashMap<String, Task>,
    bus: Arc<Bus>,
}

impl MemoryStore {
    pub fn new(bus: Arc<Bus>) -> Self {
        Self {
            sessions: DashMap::new(),
            messages: DashMap::new(),
            tasks: DashMap::new(),
            bus,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(Bus::default()))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create(&self, session: Session) -> Result<(), StoreError> {
        let id = session.id.clone();
        self.sessions.insert(id.clone(), session);
        publish(&self.bus, Topic::Session, "created", id);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Session, StoreError> {
        self.sessions.get(id).map(|r| r.clone()).ok_or_else(|| StoreError::SessionNotFound(id.to_string()))
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions.insert(session.id.clone(), session.clone());
        publish(&self.bus, Topic::Session, "updated", session.id.clone());
        Ok(())
    }

    async fn children_of(&self, parent_id: &str) -> Result<Vec<Session>, StoreError> {
        Ok(self
            .sessions
            .iter()
            .filter(|entry| entry.parent.as_deref() == Some(parent_id))
            .map(|entry| entry.clone())
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.sessions.remove(id);
        publish(&self.bus, Topic::Session, "deleted", id.to_string());
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, message: Message) -> Result<(), StoreError> {
        let id = message.id.clone();
        self.messages.insert(id.clone(), message);
        publish(&self.bus, Topic::Message, "appended", id);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Message, StoreError> {
        self.messages.get(id).map(|r| r.clone()).ok_or_else(|| StoreError::MessageNotFound(id.to_string()))
    }

    async fn save(&self, message: &Message) -> Result<(), StoreError> {
        self.messages.insert(message.id.clone(), message.clone());
        publish(&self.bus, Topic::Message, "updated", message.id.clone());
        Ok(())
    }

    async fn list_for_session(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter(|entry| entry.session_id == session_id)
            .map(|entry| entry.clone())
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create(&self, task: Task) -> Result<(), StoreError> {
        let id = task.id.clone();
        self.tasks.insert(id.clone(), task);
        publish(&self.bus, Topic::Session, "task_created", id);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Task, StoreError> {
        self.tasks.get(id).map(|r| r.clone()).ok_or_else(|| StoreError::TaskNotFound(id.to_string()))
    }

    async fn save(&self, task: &Task) -> Result<(), StoreError> {
        self.tasks.insert(task.id.clone(), task.clone());
        publish(&self.bus, Topic::Session, "task_updated", task.id.clone());
        Ok(())
    }

    async fn list_for_session(&self, session_id: &str) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .tasks
            .iter()
            .filter(|entry| entry.session_id == session_id)
            .map(|entry| entry.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn create_then_get_roundtrips() {
        let store = MemoryStore::default();
        let session = Session::new_root("ses_1", "chat", Utc::now());
        store.create(session.clone()).await.expect("create");
        let fetched = store.get("ses_1").await.expect("get");
        assert_eq!(fetched.id, session.id);
    }

    #[tokio::test]
    async fn get_missing_session_errors() {
        let store = MemoryStore::default();
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn children_of_filters_by_parent() {
        let store = MemoryStore::default();
        let parent = Session::new_root("ses_1", "chat", Utc::now());
        let child = Session::new_child("ses_2", &parent, "subagent", Utc::now());
        store.create(parent).await.expect("create parent");
        store.create(child).await.expect("create child");
        let children = store.children_of("ses_1").await.expect("children");
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, "ses_2");
    }

    #[tokio::test]
    async fn messages_list_sorted_by_created_at() {
        let store = MemoryStore::default();
        let now = Utc::now();
        let m1 = Message::new("m1", "ses_1", hive_protocol::Role::User, now);
        let m2 = Message::new("m2", "ses_1", hive_protocol::Role::Assistant, now + chrono::Duration::seconds(1));
        store.append(m2.clone()).await.expect("append m2");
        store.append(m1.clone()).await.expect("append m1");
        let listed = store.list_for_session("ses_1").await.expect("list");
        assert_eq!(listed.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["m1", "m2"]);
    }
}
