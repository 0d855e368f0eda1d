#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("path escapes the sandbox root")]
    PathTraversal,
    #[error("file exceeds the {0} byte size cap")]
    TooLarge(u64),
    #[error("file is not text")]
    BinaryFile,
    #[error("no recent read recorded for this path; read it before writing")]
    StaleRead,
    #[error("path does not exist: {0}")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
