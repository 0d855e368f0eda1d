//! `Content-Length`-framed JSON-RPC transport over a child process's
//! stdio, the wire format every LSP server speaks.

use std::collections::HashMap;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::process::ChildStdin;
use tokio::process::ChildStdout;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::error::LspError;
use crate::error::RpcError;

/// A server-initiated notification or request, relayed to whoever wants
/// to observe it (diagnostics, in our case).
#[derive(Debug, Clone)]
pub struct Notification {
    pub method: String,
    pub params: Value,
}

struct Pending {
    sender: oneshot::Sender<Result<Value, LspError>>,
}

pub struct JsonRpcConnection {
    stdin: Mutex<ChildStdin>,
    next_id: AtomicI64,
    pending: Mutex<HashMap<i64, Pending>>,
    closed: CancellationToken,
}

impl JsonRpcConnection {
    /// Spawn the connection, wiring a background reader task that routes
    /// responses to pending requests and forwards everything else (server
    /// notifications and server-to-client requests) onto `notification_tx`.
    pub fn spawn(stdin: ChildStdin, stdout: ChildStdout, notification_tx: mpsc::Sender<Notification>) -> Arc<Self> {
        let conn = Arc::new(Self {
            stdin: Mutex::new(stdin),
            next_id: AtomicI64::new(1),
            pending: Mutex::new(HashMap::new()),
            closed: CancellationToken::new(),
        });

        let reader_conn = Arc::clone(&conn);
        tokio::spawn(async move {
            reader_conn.read_loop(stdout, notification_tx).await;
        });

        conn
    }

    /// Resolves once the stdio reader observes the child's stdout close or
    /// error out — the signal `LspProcessClient` uses to flip its state to
    /// `Error` on an unprompted crash, as opposed to a deliberate shutdown.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    async fn read_loop(&self, stdout: ChildStdout, notification_tx: mpsc::Sender<Notification>) {
        let mut reader = BufReader::new(stdout);
        loop {
            match read_message(&mut reader).await {
                Ok(Some(message)) => self.dispatch(message, &notification_tx).await,
                Ok(None) => {
                    debug!("language server stdout closed");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "failed to read language server message");
                    break;
                }
            }
        }
        self.fail_all_pending().await;
        self.closed.cancel();
    }

    async fn dispatch(&self, message: Value, notification_tx: &mpsc::Sender<Notification>) {
        if let Some(id) = message.get("id").and_then(|v| v.as_i64()) {
            if message.get("method").is_none() {
                let mut pending = self.pending.lock().await;
                if let Some(entry) = pending.remove(&id) {
                    let result = if let Some(error) = message.get("error") {
                        let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
                        let text = error.get("message").and_then(|m| m.as_str()).unwrap_or("").to_string();
                        Err(LspError::Rpc(RpcError { code, message: text }))
                    } else {
                        Ok(message.get("result").cloned().unwrap_or(Value::Null))
                    };
                    let _ = entry.sender.send(result);
                }
                return;
            }
        }

        if let Some(method) = message.get("method").and_then(|m| m.as_str()) {
            let params = message.get("params").cloned().unwrap_or(Value::Null);
            let _ = notification_tx
                .send(Notification {
                    method: method.to_string(),
                    params,
                })
                .await;
        }
    }

    async fn fail_all_pending(&self) {
        let mut pending = self.pending.lock().await;
        for (_, entry) in pending.drain() {
            let _ = entry.sender.send(Err(LspError::Closed));
        }
    }

    async fn write_message(&self, value: &Value) -> Result<(), LspError> {
        let body = serde_json::to_vec(value)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(header.as_bytes()).await?;
        stdin.write_all(&body).await?;
        stdin.flush().await?;
        Ok(())
    }

    pub async fn notify(&self, method: &str, params: Value) -> Result<(), LspError> {
        let message = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.write_message(&message).await
    }

    pub async fn request_with_timeout(&self, method: &str, params: Value, timeout: Duration) -> Result<Value, LspError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id, Pending { sender: tx });
        }

        let message = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        self.write_message(&message).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(LspError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(LspError::Timeout(method.to_string()))
            }
        }
    }
}

async fn read_message(reader: &mut BufReader<ChildStdout>) -> std::io::Result<Option<Value>> {
    let mut content_length: Option<usize> = None;
    let mut line = Vec::new();
    loop {
        line.clear();
        let byte_count = read_header_line(reader, &mut line).await?;
        if byte_count == 0 {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(&line);
        let text = text.trim_end_matches(['\r', '\n']);
        if text.is_empty() {
            break;
        }
        if let Some(value) = text.strip_prefix("Content-Length:") {
            content_length = value.trim().parse().ok();
        }
    }

    let length = match content_length {
        Some(length) => length,
        None => return Ok(None),
    };

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    Ok(Some(value))
}

async fn read_header_line(reader: &mut BufReader<ChildStdout>, line: &mut Vec<u8>) -> std::io::Result<usize> {
    let mut total = 0;
    loop {
        let mut byte = [0u8; 1];
        let n = reader.read(&mut byte).await?;
        if n == 0 {
            return Ok(total);
        }
        total += 1;
        line.push(byte[0]);
        if byte[0] == b'\n' {
            return Ok(total);
        }
    }
}
