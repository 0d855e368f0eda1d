//! Mock-server tests for the provider adapter's HTTP retry path: these
//! hit a real (local) HTTP server so the request builder, retry loop, and
//! SSE parser all run exactly as they would against a live provider.

use std::time::Duration;

use chrono::Utc;
use hive_protocol::config::ProviderConfig;
use hive_protocol::Message;
use hive_protocol::Role;
use hive_provider::retry::RetryConfig;
use hive_provider::wire::ToolSpec;
use hive_provider::ProviderClient;
use hive_provider::ProviderError;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

const SUCCESS_SSE_BODY: &str = concat!(
    "data: {\"type\":\"message_start\",\"message\":{}}\n\n",
    "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
    "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"hello\"}}\n\n",
    "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
    "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":3}}\n\n",
    "data: {\"type\":\"message_stop\"}\n\n",
);

fn test_config(server: &MockServer) -> ProviderConfig {
    ProviderConfig {
        api_key: Some("test-key".to_string()),
        base_url: Some(server.uri()),
        disabled: false,
        headers: Default::default(),
    }
}

fn user_message() -> Vec<Message> {
    let mut msg = Message::new("m1", "s1", Role::User, Utc::now());
    msg.append_text_delta("hi", Utc::now()).expect("ok");
    vec![msg]
}

fn fast_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 8,
        initial_backoff: Duration::from_millis(1),
        backoff_multiplier: 2.0,
        jitter_ratio: 0.0,
        respect_retry_after: true,
    }
}

#[tokio::test]
async fn send_retries_past_rate_limit_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(SUCCESS_SSE_BODY, "text/event-stream")
                .insert_header("content-type", "text/event-stream"),
        )
        .mount(&server)
        .await;

    let client = ProviderClient::new(test_config(&server), "test-model").with_retry_config(fast_retry_config());
    let response = client.send(&user_message(), &[]).await.expect("send succeeds after retry");

    assert_eq!(response.text, "hello");
    assert_eq!(response.finish_reason, hive_protocol::FinishReason::EndTurn);
    assert_eq!(response.usage.expect("usage").output_tokens, 3);
}

#[tokio::test]
async fn send_does_not_retry_non_retryable_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ProviderClient::new(test_config(&server), "test-model").with_retry_config(fast_retry_config());
    let err = client.send(&user_message(), &[]).await.unwrap_err();
    assert!(matches!(err, ProviderError::Http { status: 400, .. }));
}

#[tokio::test]
async fn send_exhausts_retries_on_persistent_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = RetryConfig {
        max_attempts: 3,
        ..fast_retry_config()
    };
    let client = ProviderClient::new(test_config(&server), "test-model").with_retry_config(config);
    let err = client.send(&user_message(), &[]).await.unwrap_err();
    assert!(matches!(err, ProviderError::RetriesExhausted { attempts: 3, .. }));
}

#[test]
fn tool_spec_serializes_with_input_schema() {
    let spec = ToolSpec {
        name: "read".to_string(),
        description: "read a file".to_string(),
        input_schema: serde_json::json!({ "type": "object" }),
    };
    let value = serde_json::to_value(&spec).expect("serialize");
    assert_eq!(value["name"], "read");
    assert_eq!(value["input_schema"]["type"], "object");
}
