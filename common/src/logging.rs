//! Structured logging setup shared by every binary in the workspace.
//!
//! Installs a single global `tracing` subscriber with an `env-filter`
//! layer (respecting `RUST_LOG`) and a `fmt` layer whose timestamps can be
//! rendered in the user's local timezone or UTC. Optionally tees the same
//! events to the session-scoped `debug.log` sidecar under the configured
//! data directory.

use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Which timezone log timestamps are rendered in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimezoneConfig {
    #[default]
    Local,
    Utc,
}

/// A single timer type that switches behavior at runtime, avoiding the
/// type-system friction of returning different `FormatTime` impls per arm.
#[derive(Debug, Clone)]
pub struct ConfigurableTimer {
    timezone: TimezoneConfig,
}

impl ConfigurableTimer {
    pub fn new(timezone: TimezoneConfig) -> Self {
        Self { timezone }
    }
}

impl FormatTime for ConfigurableTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        match self.timezone {
            TimezoneConfig::Local => {
                let now = chrono::Local::now();
                write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S%.3f"))
            }
            TimezoneConfig::Utc => {
                let now = chrono::Utc::now();
                write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S%.3fZ"))
            }
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Safe to call once per process; a second
/// call is a no-op (the underlying `try_init` error is swallowed since
/// tests in multiple modules may each try to initialize logging).
///
/// `log_file`, when given, is opened in append mode and receives the same
/// events as stdout, without ANSI color codes — the `debug.log` sidecar.
/// A file that can't be opened is skipped rather than failing startup.
pub fn init_tracing(timezone: TimezoneConfig, log_file: Option<&Path>) {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_timer(ConfigurableTimer::new(timezone))
        .with_target(true)
        .with_filter(env_filter());

    let file_layer = log_file.and_then(|path| {
        OpenOptions::new().create(true).append(true).open(path).ok().map(|file| {
            tracing_subscriber::fmt::layer()
                .with_timer(ConfigurableTimer::new(timezone))
                .with_target(true)
                .with_ansi(false)
                .with_writer(file)
                .with_filter(env_filter())
        })
    });

    let _ = tracing_subscriber::registry().with(stdout_layer).with(file_layer).try_init();
}
