//! Error type surfaced at the agent loop's public boundary (§7).

#[derive(Debug, thiserror::Error)]
pub enum AgentLoopError {
    #[error("session {0} already has an active request")]
    SessionBusy(String),
    #[error("subagent depth limit ({0}) exceeded")]
    DepthExceeded(u32),
    #[error("unknown agent: {0}")]
    UnknownAgent(String),
    #[error("agent \"{0}\" has no usable model; expected \"provider/model\"")]
    MalformedModel(String),
    #[error("agent \"{0}\" references unknown provider \"{1}\"")]
    UnknownProvider(String, String),
    #[error(transparent)]
    Store(#[from] hive_state::StoreError),
    #[error(transparent)]
    Message(#[from] hive_protocol::message::MessageError),
    #[error(transparent)]
    Provider(#[from] hive_provider::ProviderError),
    #[error(transparent)]
    Permission(#[from] hive_permission::PermissionError),
}
