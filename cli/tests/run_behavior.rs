//! End-to-end test of the component graph (§4's data-flow paragraph):
//! build every component against a real local HTTP server and a real
//! sqlite file, then drive one turn through it exactly as `main` would.

use std::collections::HashMap;

use hive_protocol::config::AgentConfig;
use hive_protocol::config::AgentMode;
use hive_protocol::config::Config;
use hive_protocol::config::ProviderConfig;
use hive_protocol::FinishReason;
use hive_protocol::Session;
use hive_state::MessageStore;
use hive_state::SessionStore;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

const END_TURN_SSE: &str = concat!(
    "data: {\"type\":\"message_start\",\"message\":{}}\n\n",
    "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
    "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"hi there\"}}\n\n",
    "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
    "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":2}}\n\n",
    "data: {\"type\":\"message_stop\"}\n\n",
);

#[tokio::test]
async fn a_full_component_graph_runs_one_turn_to_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(END_TURN_SSE, "text/event-stream"))
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.providers.insert(
        "mock".to_string(),
        ProviderConfig {
            api_key: None,
            base_url: Some(server.uri()),
            disabled: false,
            headers: HashMap::new(),
        },
    );
    config.agents.insert(
        "hivemind".to_string(),
        AgentConfig {
            model: "mock/test-model".to_string(),
            max_tokens: None,
            reasoning_effort: None,
            permission: HashMap::new(),
            tools: vec![],
            mode: Some(AgentMode::Agent),
            prompt: Some("be terse".to_string()),
            hidden: false,
        },
    );

    let dir = tempfile::tempdir().expect("tempdir");
    let components = hive_cli::wiring::build(config, dir.path()).await.expect("component graph builds");

    components.sessions.create(Session::new_root("s1", "chat", chrono::Utc::now())).await.expect("session created");

    let finish = components.agent_loop.run_turn("s1", "hivemind", "hello").await.expect("turn completes");
    assert_eq!(finish, FinishReason::EndTurn);

    let history = components.messages.list_for_session("s1").await.expect("history");
    assert_eq!(history.len(), 2, "user turn plus one assistant turn");
}
