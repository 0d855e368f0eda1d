//! `LspPool`: one process per configured language server whose
//! extensions are actually present in the workspace, discovered by a
//! shallow (depth ≤ 3) scan that prunes hidden, `node_modules`, `vendor`,
//! `dist`, `build`, and `target` directories. Startup is asynchronous and
//! non-fatal — a server that fails to initialize is reported as `Error`
//! rather than aborting the pool.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use hive_file_ignore::FileIgnoreService;
use hive_protocol::Config;
use hive_protocol::LspState;
use notify::RecursiveMode;
use notify::Watcher;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tokio::time::Duration;
use tracing::info;
use tracing::warn;

use crate::process_client::LspProcessClient;

const MAX_SCAN_DEPTH: usize = 3;
const MAX_RESTART_ATTEMPTS: u32 = 3;
const WAIT_FOR_DIAGNOSTICS_TIMEOUT: Duration = Duration::from_secs(5);
const GRACEFUL_SHUTDOWN_BUDGET: Duration = Duration::from_secs(5);
const FORCE_SHUTDOWN_BUDGET: Duration = Duration::from_millis(500);

pub struct LspPool {
    root: PathBuf,
    clients: RwLock<HashMap<String, Arc<LspProcessClient>>>,
    ready_tx: broadcast::Sender<String>,
}

impl LspPool {
    /// Scan `root` for matching extensions and spawn one process per
    /// configured, non-disabled server that has at least one match.
    pub async fn init(root: &Path, config: &Config) -> Arc<Self> {
        let (ready_tx, _) = broadcast::channel(64);
        let pool = Arc::new(Self {
            root: root.to_path_buf(),
            clients: RwLock::new(HashMap::new()),
            ready_tx,
        });

        let present_extensions = scan_extensions(root, MAX_SCAN_DEPTH);

        for (name, server) in config.lsp.clone() {
            if server.disabled {
                continue;
            }
            let matches = server.extensions.iter().any(|ext| present_extensions.contains(ext));
            if !matches {
                continue;
            }

            let pool = Arc::clone(&pool);
            let root = root.to_path_buf();
            tokio::spawn(async move {
                pool.spawn_and_track(&name, &server, &root, 0).await;
            });
        }

        spawn_workspace_watcher(Arc::clone(&pool), root.to_path_buf());

        pool
    }

    async fn spawn_and_track(self: &Arc<Self>, name: &str, server: &hive_protocol::config::LspServerConfig, root: &Path, attempt: u32) {
        let client = match LspProcessClient::spawn(name, &server.command, &server.args, &server.env, &server.extensions, root).await {
            Ok(client) => client,
            Err(err) => {
                warn!(server = name, error = %err, "failed to spawn language server");
                return;
            }
        };

        let is_ready = matches!(client.state().await, hive_protocol::LspClientState::Ready);
        self.clients.write().await.insert(name.to_string(), Arc::clone(&client));
        if is_ready {
            let _ = self.ready_tx.send(name.to_string());
            info!(server = name, "language server registered");

            for path in scan_files_with_extensions(root, MAX_SCAN_DEPTH, &server.extensions) {
                if let Err(err) = client.notify_open(&path).await {
                    warn!(server = name, path = %path.display(), error = %err, "initial notify_open failed");
                }
            }
        }

        let pool = Arc::clone(self);
        let name = name.to_string();
        let server = server.clone();
        let root = root.to_path_buf();
        tokio::spawn(async move {
            pool.watch_for_crash(client, name, server, root, attempt).await;
        });
    }

    /// Detached restart loop: on process exit, remove the client from the
    /// pool under a lock, then respawn unless attempts are exhausted. The
    /// caller's cancellation never reaches this task, matching the
    /// detached-cleanup requirement for restarts.
    async fn watch_for_crash(
        self: Arc<Self>,
        client: Arc<LspProcessClient>,
        name: String,
        server: hive_protocol::config::LspServerConfig,
        root: PathBuf,
        attempt: u32,
    ) {
        // Poll state; a well-behaved process only transitions to `Error`
        // via `shutdown_with_budget`, which this task treats as a crash
        // unless the pool is the one that initiated the shutdown.
        loop {
            tokio::time::sleep(Duration::from_millis(500)).await;
            if client.state().await == hive_protocol::LspClientState::Error {
                break;
            }
            if !self.clients.read().await.contains_key(&name) {
                return;
            }
        }

        self.clients.write().await.remove(&name);

        if attempt + 1 >= MAX_RESTART_ATTEMPTS {
            warn!(server = %name, "language server exceeded max restart attempts, giving up");
            return;
        }

        warn!(server = %name, attempt = attempt + 1, "restarting crashed language server");
        self.spawn_and_track(&name, &server, &root, attempt + 1).await;
    }

    pub async fn clients(&self) -> HashMap<String, LspState> {
        let mut snapshot = HashMap::new();
        for (name, client) in self.clients.read().await.iter() {
            let mut state = LspState::starting(name.clone(), client.extensions.clone());
            state.state = client.state().await;
            snapshot.insert(name.clone(), state);
        }
        snapshot
    }

    pub fn clients_ch(&self) -> broadcast::Receiver<String> {
        self.ready_tx.subscribe()
    }

    pub async fn clients_for_file(&self, path: &Path) -> Vec<String> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        self.clients
            .read()
            .await
            .values()
            .filter(|client| client.serves_extension(ext))
            .map(|client| client.name.clone())
            .collect()
    }

    /// Open or notify-change on every client that serves `path`'s
    /// extension.
    pub async fn notify_open(&self, path: &Path) {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let targets: Vec<Arc<LspProcessClient>> = self
            .clients
            .read()
            .await
            .values()
            .filter(|client| client.serves_extension(ext))
            .cloned()
            .collect();

        for client in targets {
            if let Err(err) = client.notify_open(path).await {
                warn!(server = %client.name, path = %path.display(), error = %err, "notify_open failed");
            }
        }
    }

    /// Open/notify-change on matching clients, then wait for the first of:
    /// diagnostics for `path` arrive, any diagnostic set changes, the 5s
    /// deadline elapses. Returns whatever diagnostics are known for `path`
    /// at that point (possibly `None`).
    pub async fn wait_for_diagnostics(&self, path: &Path) -> Option<Value> {
        self.notify_open(path).await;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let targets: Vec<Arc<LspProcessClient>> = self
            .clients
            .read()
            .await
            .values()
            .filter(|client| client.serves_extension(ext))
            .cloned()
            .collect();

        if targets.is_empty() {
            return None;
        }

        for client in &targets {
            if let Some(diagnostics) = client.diagnostics_for(path).await {
                return Some(diagnostics);
            }
        }

        let mut receivers: Vec<_> = targets.iter().map(|c| c.subscribe_diagnostics()).collect();
        let deadline = tokio::time::Instant::now() + WAIT_FOR_DIAGNOSTICS_TIMEOUT;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }

            let mut pending: futures::stream::FuturesUnordered<_> =
                receivers.iter_mut().map(|rx| Box::pin(rx.recv())).collect();

            let outcome = tokio::select! {
                _ = tokio::time::sleep(remaining) => None,
                next = futures::StreamExt::next(&mut pending) => next,
            };
            drop(pending);

            match outcome {
                Some(Ok(_uri)) => {
                    for client in &targets {
                        if let Some(diagnostics) = client.diagnostics_for(path).await {
                            return Some(diagnostics);
                        }
                    }
                }
                _ => return None,
            }
        }
    }

    /// Cancel watchers, wait, then shut down each client with a 5s budget.
    pub async fn shutdown(&self) {
        let clients: Vec<Arc<LspProcessClient>> = self.clients.write().await.drain().map(|(_, c)| c).collect();
        for client in clients {
            client.shutdown_with_budget(GRACEFUL_SHUTDOWN_BUDGET).await;
        }
    }

    /// Drop to a 500ms budget per client, then hard-close.
    pub async fn force_shutdown(&self) {
        let clients: Vec<Arc<LspProcessClient>> = self.clients.write().await.drain().map(|(_, c)| c).collect();
        for client in clients {
            client.shutdown_with_budget(FORCE_SHUTDOWN_BUDGET).await;
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Collect the set of file extensions present in `root`, descending at
/// most `max_depth` levels. Reuses the sandbox/tool-runtime ignore
/// policy so `.git`, `node_modules`, `vendor`, `dist`, `build`, `target`,
/// and any `.gitignore`d paths are pruned the same way everywhere.
fn scan_extensions(root: &Path, max_depth: usize) -> std::collections::HashSet<String> {
    let mut extensions = std::collections::HashSet::new();
    let service = FileIgnoreService::with_defaults();
    let walker = service.create_walk_builder(root).max_depth(Some(max_depth)).build();

    for entry in walker.flatten() {
        if entry.file_type().is_some_and(|t| t.is_file()) {
            if let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) {
                extensions.insert(ext.to_string());
            }
        }
    }

    extensions
}

/// Collect file paths under `root` (same depth/ignore policy as
/// `scan_extensions`) whose extension is one of `extensions` — the
/// files a freshly-registered server should see opened right away.
fn scan_files_with_extensions(root: &Path, max_depth: usize, extensions: &[String]) -> Vec<PathBuf> {
    let service = FileIgnoreService::with_defaults();
    let walker = service.create_walk_builder(root).max_depth(Some(max_depth)).build();

    walker
        .flatten()
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.path().to_path_buf())
        .filter(|path| path.extension().and_then(|e| e.to_str()).is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))))
        .collect()
}

/// The workspace watcher (§4.6 step 3): walk the root once to establish a
/// baseline, then relay every subsequent filesystem event under it to
/// whichever registered clients serve the changed file's extension, for
/// the lifetime of the pool. Paths under a default-ignored directory
/// (`.git`, `node_modules`, ...) are dropped before they reach a client.
fn spawn_workspace_watcher(pool: Arc<LspPool>, root: PathBuf) {
    let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<notify::Event>>();
    let mut watcher = match notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    }) {
        Ok(watcher) => watcher,
        Err(err) => {
            warn!(error = %err, "failed to start workspace watcher");
            return;
        }
    };

    if let Err(err) = watcher.watch(&root, RecursiveMode::Recursive) {
        warn!(root = %root.display(), error = %err, "failed to watch workspace root");
        return;
    }

    tokio::spawn(async move {
        // Keep the watcher alive for as long as this task runs; dropping
        // it would tear down the OS-level subscription.
        let _watcher = watcher;
        while let Some(event) = rx.recv().await {
            match event {
                Ok(event) => {
                    for path in event.paths {
                        if is_ignored_path(&root, &path) || !path.is_file() {
                            continue;
                        }
                        pool.notify_open(&path).await;
                    }
                }
                Err(err) => warn!(error = %err, "workspace watcher error"),
            }
        }
    });
}

fn is_ignored_path(root: &Path, path: &Path) -> bool {
    let Ok(rel) = path.strip_prefix(root) else {
        return false;
    };
    rel.components().any(|component| {
        component.as_os_str().to_str().is_some_and(|name| hive_file_ignore::DEFAULT_IGNORE_DIRECTORIES.contains(&name))
    })
}
