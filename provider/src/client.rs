//! HTTP client driving the generic content-block wire format: builds a
//! request from `(messages, tools)`, sends it with retry, and either
//! collects a single `Response` or relays a live `StreamEvent` channel.

use std::collections::HashMap;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::StreamExt;
use hive_protocol::config::ProviderConfig;
use hive_protocol::Message;
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::event::map_finish_reason;
use crate::event::StreamEvent;
use crate::event::TokenUsage;
use crate::retry::retry;
use crate::retry::RetryConfig;
use crate::wire::build_request;
use crate::wire::ContentBlockHeader;
use crate::wire::ContentDelta;
use crate::wire::Response;
use crate::wire::SseEvent;
use crate::wire::ToolSpec;

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);
const STREAM_CHANNEL_CAPACITY: usize = 64;

pub struct ProviderClient {
    http: reqwest::Client,
    config: ProviderConfig,
    model: String,
    retry_config: RetryConfig,
    idle_timeout: Duration,
}

impl ProviderClient {
    pub fn new(config: ProviderConfig, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            model: model.into(),
            retry_config: RetryConfig::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    fn endpoint(&self) -> Result<String, ProviderError> {
        let base = self
            .config
            .base_url
            .as_deref()
            .ok_or_else(|| ProviderError::Parse("provider has no baseURL configured".into()))?;
        Ok(format!("{}/v1/messages", base.trim_end_matches('/')))
    }

    fn apply_auth_and_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut builder = builder;
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }
        for (key, value) in &self.config.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder
    }

    /// Send one request with retry and return the raw HTTP response on
    /// success. Callers read the body (buffered or streamed) themselves.
    async fn send_request(&self, body: &serde_json::Value) -> Result<reqwest::Response, ProviderError> {
        let endpoint = self.endpoint()?;
        retry(&self.retry_config, || async {
            let request = self
                .apply_auth_and_headers(self.http.post(&endpoint).json(body))
                .build()
                .map_err(ProviderError::Transport)?;
            let response = self.http.execute(request).await.map_err(ProviderError::Transport)?;

            let status = response.status();
            if status.as_u16() == 429 {
                let retry_after = parse_retry_after(response.headers());
                return Err(ProviderError::RateLimited { retry_after });
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderError::Http { status: status.as_u16(), body });
            }
            Ok(response)
        })
        .await
    }

    /// Non-streaming call: drives the same SSE path internally and
    /// accumulates it into a single `Response`.
    pub async fn send(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Response, ProviderError> {
        let mut rx = self.stream(messages, tools).await?;
        let mut response = Response::default();
        let mut open_tool_calls: HashMap<String, (String, String)> = HashMap::new();

        while let Some(event) = rx.recv().await {
            match event? {
                StreamEvent::ContentDelta { text } => response.text.push_str(&text),
                StreamEvent::ThinkingDelta { text } => response.thinking.push_str(&text),
                StreamEvent::ToolUseStart { id, name } => {
                    open_tool_calls.insert(id, (name, String::new()));
                }
                StreamEvent::ToolUseDelta { id, partial_json } => {
                    if let Some((_, input)) = open_tool_calls.get_mut(&id) {
                        input.push_str(&partial_json);
                    }
                }
                StreamEvent::ToolUseStop { id } => {
                    if let Some((name, input)) = open_tool_calls.remove(&id) {
                        response.tool_calls.push((id, name, input));
                    }
                }
                StreamEvent::Complete { finish_reason, usage } => {
                    response.finish_reason = finish_reason;
                    response.usage = usage;
                }
                StreamEvent::Error { message } => return Err(ProviderError::Stream(message)),
                StreamEvent::ContentStart | StreamEvent::ContentStop | StreamEvent::Warning { .. } => {}
            }
        }

        Ok(response)
    }

    /// Streaming call: returns a channel of `StreamEvent`s translated
    /// from the provider's SSE body as they arrive.
    pub async fn stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<mpsc::Receiver<Result<StreamEvent, ProviderError>>, ProviderError> {
        let body = build_request(&self.model, messages, tools, true);
        let response = self.send_request(&body).await?;

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let idle_timeout = self.idle_timeout;
        tokio::spawn(async move {
            pump_sse(response, tx, idle_timeout).await;
        });
        Ok(rx)
    }
}

/// Track which content-block index is currently open and of what kind,
/// so a `content_block_delta` can be routed to the right `StreamEvent`.
enum OpenBlock {
    Text,
    Thinking,
    ToolUse { id: String },
}

async fn pump_sse(response: reqwest::Response, tx: mpsc::Sender<Result<StreamEvent, ProviderError>>, idle_timeout: Duration) {
    let mut stream = response.bytes_stream().eventsource();
    let mut open_blocks: HashMap<usize, OpenBlock> = HashMap::new();
    let mut usage = TokenUsage::default();

    loop {
        let next = match tokio::time::timeout(idle_timeout, stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                let _ = tx.send(Err(ProviderError::IdleTimeout)).await;
                return;
            }
        };

        let sse = match next {
            Some(Ok(sse)) => sse,
            Some(Err(err)) => {
                let _ = tx.send(Err(ProviderError::Stream(err.to_string()))).await;
                return;
            }
            None => return,
        };

        if sse.data.trim().is_empty() {
            continue;
        }

        let event: SseEvent = match serde_json::from_str(&sse.data) {
            Ok(event) => event,
            Err(err) => {
                tracing::debug!(error = %err, data = %sse.data, "skipping unparsable SSE payload");
                continue;
            }
        };

        let translated = match event {
            SseEvent::MessageStart { .. } | SseEvent::Ping => None,
            SseEvent::ContentBlockStart { index, content_block } => match content_block {
                ContentBlockHeader::Text { .. } => {
                    open_blocks.insert(index, OpenBlock::Text);
                    Some(StreamEvent::ContentStart)
                }
                ContentBlockHeader::Thinking { .. } => {
                    open_blocks.insert(index, OpenBlock::Thinking);
                    Some(StreamEvent::ContentStart)
                }
                ContentBlockHeader::ToolUse { id, name } => {
                    open_blocks.insert(index, OpenBlock::ToolUse { id: id.clone() });
                    Some(StreamEvent::ToolUseStart { id, name })
                }
            },
            SseEvent::ContentBlockDelta { index, delta } => match (open_blocks.get(&index), delta) {
                (Some(OpenBlock::Text), ContentDelta::TextDelta { text }) => Some(StreamEvent::ContentDelta { text }),
                (Some(OpenBlock::Thinking), ContentDelta::ThinkingDelta { thinking }) => {
                    Some(StreamEvent::ThinkingDelta { text: thinking })
                }
                (Some(OpenBlock::ToolUse { id }), ContentDelta::InputJsonDelta { partial_json }) => {
                    Some(StreamEvent::ToolUseDelta { id: id.clone(), partial_json })
                }
                _ => None,
            },
            SseEvent::ContentBlockStop { index } => match open_blocks.remove(&index) {
                Some(OpenBlock::ToolUse { id }) => Some(StreamEvent::ToolUseStop { id }),
                Some(_) => Some(StreamEvent::ContentStop),
                None => None,
            },
            SseEvent::MessageDelta { delta, usage: delta_usage } => {
                if let Some(body) = delta_usage {
                    usage.output_tokens = body.output_tokens;
                    usage.input_tokens = body.input_tokens;
                    usage.cache_creation_tokens = body.cache_creation_input_tokens;
                    usage.cache_read_tokens = body.cache_read_input_tokens;
                }
                delta.stop_reason.map(|raw| StreamEvent::Complete {
                    finish_reason: map_finish_reason(&raw),
                    usage: Some(usage),
                })
            }
            SseEvent::MessageStop => None,
            SseEvent::Error { error } => Some(StreamEvent::Error { message: error.message }),
        };

        if let Some(event) = translated {
            if tx.send(Ok(event)).await.is_err() {
                return;
            }
        }
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let value = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    value.parse::<u64>().ok().map(Duration::from_secs)
}
