//! Process pool and lifecycle manager for configured language servers:
//! spawn, `initialize`/`initialized` handshake, crash-restart, and the
//! small operation set the tool runtime and agent loop need
//! (`notify_open`, `wait_for_diagnostics`, shutdown).

pub mod error;
pub mod pool;
pub mod process_client;
pub mod rpc;

pub use error::LspError;
pub use pool::LspPool;
pub use process_client::LspProcessClient;
