//! Agent roles: named bindings of model, system prompt, tool allow-list,
//! and permission overrides (§6 `agents.{name}`), resolved against the
//! configured providers so the loop can hand each agent a ready
//! `ProviderClient`.
//!
//! Two built-in agents always exist even with an empty config, mirroring
//! the teacher's built-in `review`/`compact` agent definitions: `hivemind`
//! (the default supervisory agent) and `summarize` (invoked by
//! auto-compaction, never user-addressable as a subagent).

use std::collections::HashMap;
use std::sync::Arc;

use hive_protocol::config::AgentConfig;
use hive_protocol::config::AgentMode;
use hive_protocol::config::Config;
use hive_provider::ProviderClient;

use crate::error::AgentLoopError;

const DEFAULT_HIVEMIND_PROMPT: &str = "You are the supervisory agent for this workspace. Use the \
    available tools to accomplish the user's request directly, or delegate bounded subtasks to \
    other agents via the task tool.";

const DEFAULT_SUMMARIZE_PROMPT: &str = "You are a context compression specialist. Summarize the \
    conversation so far, preserving decisions, open questions, and file paths touched. Be concise \
    but do not drop technical detail.";

fn default_hivemind() -> AgentConfig {
    AgentConfig {
        model: "default/hivemind".to_string(),
        max_tokens: None,
        reasoning_effort: None,
        permission: HashMap::new(),
        tools: Vec::new(),
        mode: Some(AgentMode::Agent),
        prompt: Some(DEFAULT_HIVEMIND_PROMPT.to_string()),
        hidden: false,
    }
}

fn default_summarize() -> AgentConfig {
    AgentConfig {
        model: "default/summarize".to_string(),
        max_tokens: None,
        reasoning_effort: None,
        permission: HashMap::new(),
        tools: Vec::new(),
        mode: Some(AgentMode::Subagent),
        prompt: Some(DEFAULT_SUMMARIZE_PROMPT.to_string()),
        hidden: true,
    }
}

/// An agent with its provider client already constructed.
pub struct ResolvedAgent {
    pub config: AgentConfig,
    pub provider: Arc<ProviderClient>,
}

pub struct AgentRegistry {
    agents: HashMap<String, ResolvedAgent>,
}

impl AgentRegistry {
    /// Build every configured agent plus the two built-ins, resolving each
    /// agent's `model` field (`"provider/model-id"`) against
    /// `config.providers`.
    pub fn from_config(config: &Config) -> Result<Self, AgentLoopError> {
        let mut entries: HashMap<String, AgentConfig> = config.agents.clone();
        entries.entry("hivemind".to_string()).or_insert_with(default_hivemind);
        entries.entry("summarize".to_string()).or_insert_with(default_summarize);

        let mut agents = HashMap::with_capacity(entries.len());
        for (name, agent_config) in entries {
            let provider = resolve_provider(&name, &agent_config, config)?;
            agents.insert(name, ResolvedAgent { config: agent_config, provider });
        }
        Ok(Self { agents })
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedAgent> {
        self.agents.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }
}

fn resolve_provider(agent_name: &str, agent_config: &AgentConfig, config: &Config) -> Result<Arc<ProviderClient>, AgentLoopError> {
    let (provider_name, model) = agent_config
        .model
        .split_once('/')
        .ok_or_else(|| AgentLoopError::MalformedModel(agent_name.to_string()))?;

    let provider_config = config
        .providers
        .get(provider_name)
        .cloned()
        .unwrap_or_default();

    if provider_config.disabled {
        return Err(AgentLoopError::UnknownProvider(agent_name.to_string(), provider_name.to_string()));
    }

    Ok(Arc::new(ProviderClient::new(provider_config, model)))
}
