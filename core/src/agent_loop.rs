//! The agent loop itself (§4.8): guard, assemble, register, stream,
//! dispatch tools, loop, cancellation. One [`AgentLoop`] is shared across
//! every session; per-turn state lives on the stack of [`AgentLoop::run_turn`]
//! and its helpers, not on the struct.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use hive_permission::PermissionBroker;
use hive_protocol::config::AgentMode;
use hive_protocol::config::Config;
use hive_protocol::FinishReason;
use hive_protocol::Message;
use hive_protocol::Role;
use hive_protocol::Session;
use hive_protocol::ToolResultType;
use hive_provider::StreamEvent;
use hive_provider::ToolSpec;
use hive_sandbox::FileSandbox;
use hive_state::MessageStore;
use hive_state::SessionStore;
use hive_state::TaskStore;
use hive_tools::Info;
use hive_tools::ToolRegistry;
use hive_tools::ToolResponse;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::active_requests::request_key;
use crate::active_requests::summarize_key;
use crate::active_requests::ActiveRequests;
use crate::agent::AgentRegistry;
use crate::agent::ResolvedAgent;
use crate::compaction::exceeds_threshold;
use crate::compaction::CompactContext;
use crate::compaction::CompactStrategy;
use crate::context;
use crate::error::AgentLoopError;

/// Name of the built-in tool through which the supervisory agent spawns
/// a nested agent loop. Never registered in the shared `ToolRegistry`,
/// since dispatching it requires calling back into `AgentLoop` itself.
const TASK_TOOL_NAME: &str = "task";

/// Default model context window applied uniformly to every provider.
/// `ProviderConfig` carries no per-model window size, and nothing in the
/// configuration surface distinguishes one, so a single configured value
/// stands in for all of them.
const DEFAULT_WINDOW_TOKENS: usize = 200_000;

/// Maximum subagent nesting depth; a `task` call at the limit is refused
/// rather than spawning another loop.
const DEFAULT_DEPTH_LIMIT: u32 = 8;

/// Everything `AgentLoop` needs, wired once at startup and handed down as
/// `Arc`s. Grouped into one struct instead of a long constructor argument
/// list, since `hive-cli` builds every field before a turn ever runs.
pub struct AgentLoopDeps {
    pub config: Arc<Config>,
    pub agents: Arc<AgentRegistry>,
    pub sessions: Arc<dyn SessionStore>,
    pub messages: Arc<dyn MessageStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub tools: Arc<ToolRegistry>,
    pub permissions: Arc<PermissionBroker>,
    pub sandbox: Arc<FileSandbox>,
    pub lsp: Option<Arc<hive_lsp::LspPool>>,
    pub compact_strategy: Arc<dyn CompactStrategy>,
}

pub struct AgentLoop {
    config: Arc<Config>,
    agents: Arc<AgentRegistry>,
    sessions: Arc<dyn SessionStore>,
    messages: Arc<dyn MessageStore>,
    tasks: Arc<dyn TaskStore>,
    tools: Arc<ToolRegistry>,
    permissions: Arc<PermissionBroker>,
    sandbox: Arc<FileSandbox>,
    lsp: Option<Arc<hive_lsp::LspPool>>,
    compact_strategy: Arc<dyn CompactStrategy>,
    active: Arc<ActiveRequests>,
    http: reqwest::Client,
    window_tokens: usize,
    depth_limit: u32,
}

impl AgentLoop {
    pub fn new(deps: AgentLoopDeps) -> Self {
        Self {
            config: deps.config,
            agents: deps.agents,
            sessions: deps.sessions,
            messages: deps.messages,
            tasks: deps.tasks,
            tools: deps.tools,
            permissions: deps.permissions,
            sandbox: deps.sandbox,
            lsp: deps.lsp,
            compact_strategy: deps.compact_strategy,
            active: Arc::new(ActiveRequests::new()),
            http: reqwest::Client::new(),
            window_tokens: DEFAULT_WINDOW_TOKENS,
            depth_limit: DEFAULT_DEPTH_LIMIT,
        }
    }

    pub fn with_window_tokens(mut self, window_tokens: usize) -> Self {
        self.window_tokens = window_tokens;
        self
    }

    pub fn with_depth_limit(mut self, depth_limit: u32) -> Self {
        self.depth_limit = depth_limit;
        self
    }

    /// Cancel the in-flight turn for `(session_id, agent_id)`, if any.
    /// The running stream observes this at its next poll and any
    /// in-flight tool dispatch stops issuing new calls; a tool already
    /// running is not preempted mid-call.
    pub fn cancel(&self, session_id: &str, agent_id: &str) -> bool {
        self.active.cancel(&request_key(session_id, agent_id))
    }

    /// Run one user turn to completion: guard, assemble/compact, stream,
    /// dispatch tools, loop until the assistant stops calling tools.
    pub async fn run_turn(&self, session_id: &str, agent_id: &str, user_text: &str) -> Result<FinishReason, AgentLoopError> {
        self.run_turn_at_depth(session_id, agent_id, user_text, 0).await
    }

    /// Boxed because this is one edge of a recursive cycle: a `task` tool
    /// call dispatched from within a turn calls back into this function
    /// for the child session. Async fns can't recurse without an
    /// explicit heap indirection somewhere in the cycle.
    fn run_turn_at_depth<'a>(
        &'a self,
        session_id: &'a str,
        agent_id: &'a str,
        user_text: &'a str,
        depth: u32,
    ) -> Pin<Box<dyn Future<Output = Result<FinishReason, AgentLoopError>> + Send + 'a>> {
        Box::pin(async move {
            if depth > self.depth_limit {
                return Err(AgentLoopError::DepthExceeded(self.depth_limit));
            }

            let key = request_key(session_id, agent_id);
            let token = self
                .active
                .register(&key)
                .ok_or_else(|| AgentLoopError::SessionBusy(session_id.to_string()))?;

            let result = self.run_turn_inner(session_id, agent_id, user_text, depth, &token).await;
            self.active.unregister(&key);
            result
        })
    }

    async fn run_turn_inner(
        &self,
        session_id: &str,
        agent_id: &str,
        user_text: &str,
        depth: u32,
        token: &CancellationToken,
    ) -> Result<FinishReason, AgentLoopError> {
        let agent = self.agents.get(agent_id).ok_or_else(|| AgentLoopError::UnknownAgent(agent_id.to_string()))?;
        let mut session = self.sessions.get(session_id).await?;

        let now = Utc::now();
        let mut user_message = Message::new(hive_common::new_id_with_prefix("msg"), session_id, Role::User, now);
        user_message.append_text_delta(user_text, now)?;
        self.messages.append(user_message).await?;
        session.record_message(now);
        self.sessions.save(&session).await?;

        loop {
            if token.is_cancelled() {
                return Ok(FinishReason::Canceled);
            }

            let history = self.messages.list_for_session(session_id).await?;
            let history = context::history_since(&history, session.summary_message_id.as_deref());
            let context_files = context::read_context_files(&self.sandbox, &self.config.context_paths, Utc::now());
            let prompt = agent.config.prompt.as_deref().unwrap_or_default();

            let (assembled, total_tokens) = context::assemble(
                hive_common::new_id_with_prefix("msg"),
                session_id,
                prompt,
                &context_files,
                &history,
                self.window_tokens,
                Utc::now(),
            );

            if exceeds_threshold(total_tokens, self.window_tokens, self.config.auto_compact) {
                self.run_compaction(&mut session, session_id, agent_id, &history).await?;
                continue;
            }

            let tool_specs = self.tool_specs_for(agent);
            let mut rx = agent.provider.stream(&assembled, &tool_specs).await?;

            let assistant_id = hive_common::new_id_with_prefix("msg");
            let mut assistant_message = Message::new(assistant_id, session_id, Role::Assistant, Utc::now());
            let finish_reason = self.drain_stream(&mut rx, &mut assistant_message, token).await?;

            self.messages.append(assistant_message.clone()).await?;
            session.record_message(Utc::now());
            self.sessions.save(&session).await?;

            if matches!(finish_reason, FinishReason::Canceled | FinishReason::Error) {
                return Ok(finish_reason);
            }

            let (tool_finish, any_ran) = self
                .dispatch_tools(agent, agent_id, session_id, &assistant_message, depth, token)
                .await?;

            if tool_finish == FinishReason::PermissionDenied {
                return Ok(FinishReason::PermissionDenied);
            }
            if !any_ran {
                return Ok(finish_reason);
            }
            // A tool ran: extend history and go around again (§4.8 step 6).
        }
    }

    /// Drive one provider stream into `message`, returning once a
    /// `Complete` or `Error` event arrives, the channel closes, or the
    /// turn is canceled.
    async fn drain_stream(
        &self,
        rx: &mut mpsc::Receiver<Result<StreamEvent, hive_provider::ProviderError>>,
        message: &mut Message,
        token: &CancellationToken,
    ) -> Result<FinishReason, AgentLoopError> {
        loop {
            let event = tokio::select! {
                _ = token.cancelled() => {
                    if !message.is_finished() {
                        message.finalize(FinishReason::Canceled, Utc::now())?;
                    }
                    return Ok(FinishReason::Canceled);
                }
                event = rx.recv() => event,
            };

            let Some(event) = event else {
                if !message.is_finished() {
                    message.finalize(FinishReason::Unknown, Utc::now())?;
                }
                return Ok(FinishReason::Unknown);
            };

            let now = Utc::now();
            match event? {
                StreamEvent::ContentStart | StreamEvent::ContentStop | StreamEvent::Warning { .. } => {}
                StreamEvent::ContentDelta { text } => message.append_text_delta(&text, now)?,
                StreamEvent::ThinkingDelta { text } => message.append_reasoning_delta(&text, now)?,
                StreamEvent::ToolUseStart { id, name } => message.start_or_append_tool_call(&id, &name, "", now)?,
                StreamEvent::ToolUseDelta { id, partial_json } => message.start_or_append_tool_call(&id, "", &partial_json, now)?,
                StreamEvent::ToolUseStop { id } => message.finish_tool_call(&id, now)?,
                StreamEvent::Complete { finish_reason, .. } => {
                    message.finalize(finish_reason, now)?;
                    return Ok(finish_reason);
                }
                StreamEvent::Error { message: text } => {
                    tracing::warn!(error = %text, "provider stream error");
                    message.finalize(FinishReason::Error, now)?;
                    return Ok(FinishReason::Error);
                }
            }
        }
    }

    /// Dispatch every finished-but-unpaired tool call from `assistant_message`
    /// in issue order (§4.8 step 5), appending a single tool-role message
    /// with their results. Returns the resulting finish reason for this
    /// batch plus whether at least one tool actually ran.
    async fn dispatch_tools(
        &self,
        agent: &ResolvedAgent,
        agent_id: &str,
        session_id: &str,
        assistant_message: &Message,
        depth: u32,
        token: &CancellationToken,
    ) -> Result<(FinishReason, bool), AgentLoopError> {
        let pending = assistant_message.pending_tool_calls();
        if pending.is_empty() {
            return Ok((FinishReason::EndTurn, false));
        }

        let now = Utc::now();
        let mut tool_message = Message::new(hive_common::new_id_with_prefix("msg"), session_id, Role::Tool, now);
        let mut any_ran = false;
        let mut denied = false;

        for (id, name, input) in pending {
            if denied || token.is_cancelled() {
                tool_message.append_tool_result(id.to_string(), name.to_string(), ToolResultType::Text, "permission denied".to_string(), true, now)?;
                denied = true;
                continue;
            }

            let allowed = self.permissions.request(Some(agent_id), name, input).await?;
            if !allowed {
                tool_message.append_tool_result(id.to_string(), name.to_string(), ToolResultType::Text, "permission denied".to_string(), true, now)?;
                denied = true;
                continue;
            }

            any_ran = true;
            let response = if name == TASK_TOOL_NAME {
                self.run_subagent(session_id, input, depth).await?
            } else {
                let ctx = hive_tools::ToolContext {
                    session_id: session_id.to_string(),
                    message_id: tool_message.id.clone(),
                    agent_id: agent_id.to_string(),
                    is_task_agent: depth > 0,
                    sandbox: self.sandbox.clone(),
                    tasks: self.tasks.clone(),
                    lsp: self.lsp.clone(),
                    http: self.http.clone(),
                    shell: self.config.shell.clone(),
                };
                let call = hive_tools::ToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    input: input.to_string(),
                };
                self.tools.execute(&ctx, &call).await
            };

            let result_type = if response.kind == hive_tools::ToolResponseKind::Image {
                ToolResultType::Image
            } else {
                ToolResultType::Text
            };
            tool_message.append_tool_result(id.to_string(), name.to_string(), result_type, response.content, response.is_error, now)?;
        }

        self.messages.append(tool_message).await?;

        if denied {
            Ok((FinishReason::PermissionDenied, any_ran))
        } else {
            Ok((FinishReason::ToolUse, any_ran))
        }
    }

    /// Spawn a child session and a nested agent loop for a `task` call,
    /// returning the child's final assistant text as the tool's result.
    /// Cycles are prevented by construction: a child session's `parent`
    /// always points at the session that spawned it, never the reverse,
    /// so there is no path back to an ancestor.
    async fn run_subagent(&self, parent_session_id: &str, input_json: &str, depth: u32) -> Result<ToolResponse, AgentLoopError> {
        #[derive(serde::Deserialize)]
        struct TaskInput {
            agent: String,
            prompt: String,
        }

        let input: TaskInput = match serde_json::from_str(input_json) {
            Ok(input) => input,
            Err(err) => return Ok(ToolResponse::error(format!("invalid task input: {err}"))),
        };

        if self.agents.get(&input.agent).is_none() {
            return Ok(ToolResponse::error(format!("unknown agent: {}", input.agent)));
        }

        let now = Utc::now();
        let parent = self.sessions.get(parent_session_id).await?;
        let child_id = hive_common::new_id_with_prefix("ses");
        let child = Session::new_child(child_id.clone(), &parent, format!("task: {}", input.agent), now);
        self.sessions.create(child).await?;

        let finish = self.run_turn_at_depth(&child_id, &input.agent, &input.prompt, depth + 1).await?;

        let history = self.messages.list_for_session(&child_id).await?;
        let final_text = history
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(context::message_text)
            .unwrap_or_default();

        match finish {
            FinishReason::Error | FinishReason::PermissionDenied => Ok(ToolResponse::error(final_text)),
            _ => Ok(ToolResponse::ok(final_text)),
        }
    }

    /// Build the tool specs advertised to the provider: every registered
    /// tool, filtered by the agent's allow-list if it has one, plus the
    /// built-in `task` tool for non-subagent agents with depth remaining.
    fn tool_specs_for(&self, agent: &ResolvedAgent) -> Vec<ToolSpec> {
        let allow_list = &agent.config.tools;
        let mut specs: Vec<ToolSpec> = self
            .tools
            .infos()
            .into_iter()
            .filter(|info| allow_list.is_empty() || allow_list.iter().any(|name| name == &info.name))
            .map(to_tool_spec)
            .collect();

        if agent.config.mode != Some(AgentMode::Subagent) {
            specs.push(to_tool_spec(task_tool_info()));
        }
        specs
    }

    async fn run_compaction(&self, session: &mut Session, session_id: &str, agent_id: &str, history: &[Message]) -> Result<(), AgentLoopError> {
        let summarizer = self
            .agents
            .get("summarize")
            .ok_or_else(|| AgentLoopError::UnknownAgent("summarize".to_string()))?;

        let key = summarize_key(session_id, agent_id);
        let _ = self.active.register(&key);

        let user_texts = context::user_texts(history);
        let ctx = CompactContext {
            session_id,
            user_texts: &user_texts,
        };
        let prompt = self.compact_strategy.generate_prompt(&ctx);

        let now = Utc::now();
        let mut request_message = Message::new(hive_common::new_id_with_prefix("msg"), session_id, Role::User, now);
        request_message.append_text_delta(&prompt, now)?;

        let response = summarizer.provider.send(std::slice::from_ref(&request_message), &[]).await?;

        let summary_id = hive_common::new_id_with_prefix("msg");
        let summary_message = self.compact_strategy.build_summary_message(summary_id.clone(), session_id, &response.text, Utc::now());
        self.messages.append(summary_message).await?;

        session.set_summary(summary_id, Utc::now());
        self.sessions.save(session).await?;
        self.active.unregister(&key);

        Ok(())
    }
}

fn task_tool_info() -> Info {
    Info {
        name: TASK_TOOL_NAME.to_string(),
        description: "Delegate a bounded subtask to another configured agent and return its final answer.".to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "agent": { "type": "string", "description": "Name of the agent to invoke" },
                "prompt": { "type": "string", "description": "The subtask description handed to the child agent" },
            },
        }),
        required: vec!["agent".to_string(), "prompt".to_string()],
    }
}

fn to_tool_spec(info: Info) -> ToolSpec {
    let mut schema = info.parameters;
    if let Some(object) = schema.as_object_mut() {
        if !info.required.is_empty() {
            object.insert("required".to_string(), serde_json::json!(info.required));
        }
    }
    ToolSpec {
        name: info.name,
        description: info.description,
        input_schema: schema,
    }
}
