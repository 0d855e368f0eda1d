//! Uniform streaming event adapter over heterogeneous LLM HTTP APIs.
//!
//! One generic content-block wire format (`wire`) is spoken to whatever
//! `baseURL`/`apiKey`/`headers` a configured provider supplies; retries
//! (`retry`) classify HTTP 429/5xx as transient and back off
//! exponentially with jitter, honoring `Retry-After` when present.

pub mod client;
pub mod error;
pub mod event;
pub mod retry;
pub mod wire;

pub use client::ProviderClient;
pub use error::ProviderError;
pub use event::StreamEvent;
pub use event::TokenUsage;
pub use retry::RetryConfig;
pub use wire::Response;
pub use wire::ToolSpec;
