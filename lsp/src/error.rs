#[derive(Debug, thiserror::Error)]
pub enum LspError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("request {0} timed out")]
    Timeout(String),
    #[error("connection to language server closed")]
    Closed,
    #[error("failed to spawn language server process: {0}")]
    Spawn(String),
    #[error("initialize handshake failed: {0}")]
    InitFailed(String),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

#[derive(Debug, thiserror::Error)]
#[error("language server returned error {code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}
