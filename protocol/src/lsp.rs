//! LSP client state shared between the pool's lifecycle manager and any
//! consumer (the agent loop, tool runtime) that needs to read current
//! readiness/diagnostics without reaching into the pool's internals.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LspClientState {
    Starting,
    Ready,
    Error,
}

/// Everything tracked for a single running language server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LspState {
    pub server_name: String,
    pub state: LspClientState,
    pub extensions: Vec<String>,
    /// Open document URI -> last-sent version number.
    pub open_documents: HashMap<String, i64>,
    /// Document URI -> raw `publishDiagnostics` params, latest wins.
    pub diagnostics: HashMap<String, Value>,
}

impl LspState {
    pub fn starting(server_name: impl Into<String>, extensions: Vec<String>) -> Self {
        Self {
            server_name: server_name.into(),
            state: LspClientState::Starting,
            extensions,
            open_documents: HashMap::new(),
            diagnostics: HashMap::new(),
        }
    }

    pub fn serves_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e == ext)
    }

    pub fn is_ready(&self) -> bool {
        self.state == LspClientState::Ready
    }
}
