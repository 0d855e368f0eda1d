//! End-to-end tests for the agent loop against a real local HTTP server,
//! the same way the provider adapter's own retry tests work: the request
//! builder, SSE parser, and now the loop's context assembly and tool
//! dispatch all run exactly as they would against a live provider.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use hive_core::AgentLoop;
use hive_core::AgentLoopDeps;
use hive_core::AgentRegistry;
use hive_core::SimpleStrategy;
use hive_permission::PermissionBroker;
use hive_protocol::config::AgentConfig;
use hive_protocol::config::AgentMode;
use hive_protocol::config::Config;
use hive_protocol::config::PermissionConfig;
use hive_protocol::config::PermissionRule;
use hive_protocol::config::ProviderConfig;
use hive_protocol::FinishReason;
use hive_protocol::Session;
use hive_state::MemoryStore;
use hive_state::MessageStore;
use hive_state::SessionStore;
use hive_state::TaskStore;
use hive_tools::Info;
use hive_tools::Tool;
use hive_tools::ToolCall;
use hive_tools::ToolContext;
use hive_tools::ToolRegistry;
use hive_tools::ToolResponse;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

const END_TURN_SSE: &str = concat!(
    "data: {\"type\":\"message_start\",\"message\":{}}\n\n",
    "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
    "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"done\"}}\n\n",
    "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
    "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":2}}\n\n",
    "data: {\"type\":\"message_stop\"}\n\n",
);

const TOOL_CALL_SSE: &str = concat!(
    "data: {\"type\":\"message_start\",\"message\":{}}\n\n",
    "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"tool_use\",\"id\":\"call_1\",\"name\":\"echo\"}}\n\n",
    "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{\\\"text\\\":\\\"hi\\\"}\"}}\n\n",
    "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
    "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"tool_use\"},\"usage\":{\"output_tokens\":5}}\n\n",
    "data: {\"type\":\"message_stop\"}\n\n",
);

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn info(&self) -> Info {
        Info {
            name: "echo".to_string(),
            description: "echoes its input back".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {"text": {"type": "string"}}}),
            required: vec!["text".to_string()],
        }
    }

    async fn run(&self, _ctx: &ToolContext, call: &ToolCall) -> ToolResponse {
        ToolResponse::ok(call.input.clone())
    }
}

fn allow_all_permissions() -> PermissionBroker {
    let mut rules = HashMap::new();
    rules.insert("echo".to_string(), PermissionRule::Flat("allow".to_string()));
    PermissionBroker::new(PermissionConfig { rules }, HashMap::new())
}

async fn build_loop(server: &MockServer, tools: ToolRegistry, sandbox_root: &std::path::Path) -> (Arc<AgentLoop>, Arc<MemoryStore>) {
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
        "coder".to_string(),
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

    let agents = Arc::new(AgentRegistry::from_config(&config).expect("agents resolve"));
    let store = Arc::new(MemoryStore::default());
    let sandbox = Arc::new(hive_sandbox::FileSandbox::new(sandbox_root).expect("sandbox"));

    let deps = AgentLoopDeps {
        config: Arc::new(config),
        agents,
        sessions: store.clone() as Arc<dyn SessionStore>,
        messages: store.clone() as Arc<dyn MessageStore>,
        tasks: store.clone() as Arc<dyn TaskStore>,
        tools: Arc::new(tools),
        permissions: Arc::new(allow_all_permissions()),
        sandbox,
        lsp: None,
        compact_strategy: Arc::new(SimpleStrategy),
    };

    (Arc::new(AgentLoop::new(deps)), store)
}

#[tokio::test]
async fn a_turn_with_no_tool_calls_ends_the_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(END_TURN_SSE, "text/event-stream"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let (agent_loop, store) = build_loop(&server, ToolRegistry::new(), dir.path()).await;
    store
        .create(Session::new_root("s1", "chat", Utc::now()))
        .await
        .expect("session created");

    let finish = agent_loop.run_turn("s1", "coder", "hello").await.expect("turn completes");
    assert_eq!(finish, FinishReason::EndTurn);

    let history = store.list_for_session("s1").await.expect("history");
    assert_eq!(history.len(), 2, "user turn plus one assistant turn");
}

#[tokio::test]
async fn a_tool_call_is_dispatched_and_the_loop_continues_until_end_turn() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(TOOL_CALL_SSE, "text/event-stream"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(END_TURN_SSE, "text/event-stream"))
        .mount(&server)
        .await;

    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(EchoTool));
    let dir = tempfile::tempdir().expect("tempdir");
    let (agent_loop, store) = build_loop(&server, tools, dir.path()).await;
    store
        .create(Session::new_root("s1", "chat", Utc::now()))
        .await
        .expect("session created");

    let finish = agent_loop.run_turn("s1", "coder", "use the tool").await.expect("turn completes");
    assert_eq!(finish, FinishReason::EndTurn);

    let history = store.list_for_session("s1").await.expect("history");
    // user, assistant(tool_use), tool-result, assistant(end_turn)
    assert_eq!(history.len(), 4);

    let tool_result_message = &history[2];
    assert_eq!(tool_result_message.role, hive_protocol::Role::Tool);
}

#[tokio::test]
async fn a_session_already_running_a_turn_rejects_a_second_one() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(END_TURN_SSE, "text/event-stream").set_delay(std::time::Duration::from_millis(200)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let (agent_loop, store) = build_loop(&server, ToolRegistry::new(), dir.path()).await;
    store
        .create(Session::new_root("s1", "chat", Utc::now()))
        .await
        .expect("session created");

    let first = {
        let agent_loop = agent_loop.clone();
        tokio::spawn(async move { agent_loop.run_turn("s1", "coder", "first").await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let second = agent_loop.run_turn("s1", "coder", "second").await;
    assert!(matches!(second, Err(hive_core::AgentLoopError::SessionBusy(_))));

    first.await.expect("task joins").expect("first turn completes");
}
