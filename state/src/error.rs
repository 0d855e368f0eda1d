#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("message not found: {0}")]
    MessageNotFound(String),
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error(transparent)]
    Task(#[from] hive_protocol::task::TaskError),
    #[error(transparent)]
    Message(#[from] hive_protocol::message::MessageError),
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
