#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    #[error("invalid glob pattern {0:?}: {1}")]
    InvalidPattern(String, globset::Error),
    #[error("permission denied")]
    Denied,
    #[error("no ask handler installed but an `ask` rule fired for {0}")]
    NoAskHandler(String),
}
