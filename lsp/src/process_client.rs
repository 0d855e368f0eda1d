//! A single language server process: spawn, `initialize` handshake,
//! document tracking (full-text sync on every change, since the Pool's
//! only consumers are `notify_open`/diagnostics, not editing), and
//! graceful/forced shutdown.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use hive_protocol::LspClientState;
use serde_json::Value;
use tokio::process::Child;
use tokio::process::Command;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::error::LspError;
use crate::rpc::JsonRpcConnection;
use crate::rpc::Notification;

const INITIALIZE_TIMEOUT: Duration = Duration::from_secs(30);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const FORCE_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

pub struct LspProcessClient {
    pub name: String,
    pub extensions: Vec<String>,
    root: PathBuf,
    child: Mutex<Option<Child>>,
    connection: Arc<JsonRpcConnection>,
    state: Mutex<LspClientState>,
    open_documents: Mutex<HashMap<PathBuf, i64>>,
    diagnostics: Mutex<HashMap<String, Value>>,
    diagnostics_tx: broadcast::Sender<String>,
    notification_task: Mutex<Option<JoinHandle<()>>>,
}

impl LspProcessClient {
    /// Spawn the process and run the `initialize`/`initialized` handshake.
    /// Startup is non-fatal: callers observe failure via `state()` rather
    /// than an early return aborting the whole pool.
    pub async fn spawn(
        name: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        extensions: &[String],
        root: &Path,
    ) -> Result<Arc<Self>, LspError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .current_dir(root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|err| LspError::Spawn(err.to_string()))?;
        let stdin = child.stdin.take().ok_or_else(|| LspError::Spawn("missing stdin".into()))?;
        let stdout = child.stdout.take().ok_or_else(|| LspError::Spawn("missing stdout".into()))?;

        let (notification_tx, notification_rx) = mpsc::channel(256);
        let connection = JsonRpcConnection::spawn(stdin, stdout, notification_tx);
        let (diagnostics_tx, _) = broadcast::channel(256);

        let client = Arc::new(Self {
            name: name.to_string(),
            extensions: extensions.to_vec(),
            root: root.to_path_buf(),
            child: Mutex::new(Some(child)),
            connection,
            state: Mutex::new(LspClientState::Starting),
            open_documents: Mutex::new(HashMap::new()),
            diagnostics: Mutex::new(HashMap::new()),
            diagnostics_tx,
            notification_task: Mutex::new(None),
        });

        let notify_client = Arc::clone(&client);
        let task = tokio::spawn(async move {
            notify_client.notification_loop(notification_rx).await;
        });
        *client.notification_task.lock().await = Some(task);

        let crash_client = Arc::clone(&client);
        tokio::spawn(async move {
            crash_client.connection.closed().await;
            crash_client.mark_crashed().await;
        });

        match client.initialize().await {
            Ok(()) => {
                *client.state.lock().await = LspClientState::Ready;
                info!(server = name, "language server ready");
            }
            Err(err) => {
                warn!(server = name, error = %err, "language server failed to initialize");
                *client.state.lock().await = LspClientState::Error;
            }
        }

        Ok(client)
    }

    async fn initialize(&self) -> Result<(), LspError> {
        let root_uri = path_to_uri(&self.root);
        let params = serde_json::json!({
            "processId": std::process::id(),
            "rootUri": root_uri,
            "capabilities": {
                "textDocument": {
                    "synchronization": { "dynamicRegistration": false },
                    "publishDiagnostics": { "relatedInformation": true },
                }
            },
        });

        tokio::time::timeout(INITIALIZE_TIMEOUT, self.connection.request_with_timeout("initialize", params, INITIALIZE_TIMEOUT))
            .await
            .map_err(|_| LspError::InitFailed("initialize timed out".into()))??;

        self.connection.notify("initialized", serde_json::json!({})).await?;
        Ok(())
    }

    async fn notification_loop(&self, mut rx: mpsc::Receiver<Notification>) {
        while let Some(notification) = rx.recv().await {
            if notification.method == "textDocument/publishDiagnostics" {
                let uri = notification.params.get("uri").and_then(|u| u.as_str()).unwrap_or_default().to_string();
                let diagnostics = notification.params.get("diagnostics").cloned().unwrap_or(Value::Null);
                self.diagnostics.lock().await.insert(uri.clone(), diagnostics);
                let _ = self.diagnostics_tx.send(uri);
            } else {
                debug!(server = %self.name, method = %notification.method, "unhandled notification");
            }
        }
    }

    pub async fn state(&self) -> LspClientState {
        *self.state.lock().await
    }

    /// Flip to `Error` after the stdio reader observes the process close
    /// unprompted. `watch_for_crash` polls `state()` for exactly this
    /// transition to detect and restart a server that died mid-session,
    /// as opposed to one stopped via `shutdown`/`force_shutdown`.
    async fn mark_crashed(&self) {
        let mut state = self.state.lock().await;
        if *state != LspClientState::Error {
            warn!(server = %self.name, "language server process exited unexpectedly");
            *state = LspClientState::Error;
        }
    }

    pub fn serves_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    pub fn subscribe_diagnostics(&self) -> broadcast::Receiver<String> {
        self.diagnostics_tx.subscribe()
    }

    pub async fn diagnostics_for(&self, path: &Path) -> Option<Value> {
        let uri = path_to_uri(path);
        self.diagnostics.lock().await.get(&uri).cloned()
    }

    /// Open the document if unseen, otherwise push a full-text replacement
    /// with an incremented version number.
    pub async fn notify_open(&self, path: &Path) -> Result<(), LspError> {
        let contents = tokio::fs::read_to_string(path).await?;
        let uri = path_to_uri(path);
        let mut open = self.open_documents.lock().await;

        if let Some(version) = open.get_mut(path) {
            *version += 1;
            let params = serde_json::json!({
                "textDocument": { "uri": uri, "version": *version },
                "contentChanges": [{ "text": contents }],
            });
            self.connection.notify("textDocument/didChange", params).await?;
        } else {
            open.insert(path.to_path_buf(), 1);
            let language_id = language_id_for(path);
            let params = serde_json::json!({
                "textDocument": {
                    "uri": uri,
                    "languageId": language_id,
                    "version": 1,
                    "text": contents,
                }
            });
            self.connection.notify("textDocument/didOpen", params).await?;
        }
        Ok(())
    }

    /// Graceful shutdown: `shutdown` request, `exit` notification, wait
    /// for process exit within `budget`, then kill if it didn't.
    pub async fn shutdown_with_budget(&self, budget: Duration) {
        if let Some(task) = self.notification_task.lock().await.take() {
            task.abort();
        }

        let _ = tokio::time::timeout(budget, self.connection.request_with_timeout("shutdown", Value::Null, budget)).await;
        let _ = self.connection.notify("exit", Value::Null).await;

        let mut guard = self.child.lock().await;
        if let Some(mut child) = guard.take() {
            match tokio::time::timeout(budget, child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    warn!(server = %self.name, "language server did not exit within budget, killing");
                    let _ = child.kill().await;
                }
            }
        }
        *self.state.lock().await = LspClientState::Error;
    }

    pub async fn shutdown(&self) {
        self.shutdown_with_budget(SHUTDOWN_TIMEOUT).await;
    }

    pub async fn force_shutdown(&self) {
        self.shutdown_with_budget(FORCE_SHUTDOWN_TIMEOUT).await;
    }
}

fn path_to_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn language_id_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("rs") => "rust",
        Some("py") => "python",
        Some("ts") | Some("tsx") => "typescript",
        Some("js") | Some("jsx") => "javascript",
        Some("go") => "go",
        _ => "plaintext",
    }
}
