//! Store contracts shared by the in-memory and SQL backends. Every
//! mutation publishes a [`hive_common::Event`] on the bus so a UI or
//! test harness can observe state changes without polling.

use async_trait::async_trait;
use hive_protocol::Message;
use hive_protocol::Session;
use hive_protocol::Task;

use crate::error::StoreError;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: Session) -> Result<(), StoreError>;
    async fn get(&self, id: &str) -> Result<Session, StoreError>;
    async fn save(&self, session: &Session) -> Result<(), StoreError>;
    async fn children_of(&self, parent_id: &str) -> Result<Vec<Session>, StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: Message) -> Result<(), StoreError>;
    async fn get(&self, id: &str) -> Result<Message, StoreError>;
    async fn save(&self, message: &Message) -> Result<(), StoreError>;
    async fn list_for_session(&self, session_id: &str) -> Result<Vec<Message>, StoreError>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, task: Task) -> Result<(), StoreError>;
    async fn get(&self, id: &str) -> Result<Task, StoreError>;
    async fn save(&self, task: &Task) -> Result<(), StoreError>;
    async fn list_for_session(&self, session_id: &str) -> Result<Vec<Task>, StoreError>;
}
