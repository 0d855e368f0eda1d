//! Error type surfaced at the tool runtime's public boundary. Individual
//! tool handlers convert this into a `ToolResponse { is_error: true, .. }`
//! before it ever reaches the agent loop — nothing here panics across
//! the `Tool::run` boundary (the registry also recovers from a literal
//! panic via `catch_unwind`, see `registry.rs`).

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error(transparent)]
    Sandbox(#[from] hive_sandbox::SandboxError),
    #[error(transparent)]
    Store(#[from] hive_state::StoreError),
    #[error(transparent)]
    Task(#[from] hive_protocol::task::TaskError),
    #[error(transparent)]
    ApplyPatch(#[from] hive_apply_patch::ApplyPatchError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}
