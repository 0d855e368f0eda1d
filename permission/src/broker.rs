//! Permission broker: decides whether a tool call may proceed, by
//! evaluating glob-pattern rules keyed by tool name, with agent-scoped
//! rules taking precedence over global ones and more specific globs
//! beating the `*` default.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use globset::Glob;
use hive_protocol::config::PermissionConfig;
use hive_protocol::config::PermissionRule;

use crate::error::PermissionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
    Ask,
}

/// Callback the embedding UI implements to answer `ask` decisions.
/// `evaluate`/`request` never return `Ask` unresolved to the caller;
/// they drive this handler to completion synchronously (from the
/// caller's point of view — internally it awaits the UI's reply).
#[async_trait]
pub trait AskHandler: Send + Sync {
    async fn ask(&self, agent_id: Option<&str>, tool_name: &str, canonical_input: &str) -> bool;
}

pub struct PermissionBroker {
    global_rules: HashMap<String, PermissionRule>,
    agent_rules: HashMap<String, HashMap<String, PermissionRule>>,
    asker: Option<Arc<dyn AskHandler>>,
}

impl PermissionBroker {
    pub fn new(global: PermissionConfig, agent_rules: HashMap<String, HashMap<String, PermissionRule>>) -> Self {
        Self {
            global_rules: global.rules,
            agent_rules,
            asker: None,
        }
    }

    pub fn with_ask_handler(mut self, asker: Arc<dyn AskHandler>) -> Self {
        self.asker = Some(asker);
        self
    }

    /// Canonical, key-sorted JSON string used to match glob-pattern
    /// rules against a tool's input deterministically.
    pub fn canonicalize_input(input_json: &str) -> String {
        match serde_json::from_str::<serde_json::Value>(input_json) {
            // `serde_json::Map` is backed by a `BTreeMap` (no
            // `preserve_order` feature), so round-tripping through it
            // sorts keys for us.
            Ok(value) => serde_json::to_string(&value).unwrap_or_else(|_| input_json.to_string()),
            Err(_) => input_json.to_string(),
        }
    }

    fn rule_for(&self, agent_id: Option<&str>, tool_name: &str) -> Option<&PermissionRule> {
        if let Some(agent_id) = agent_id {
            if let Some(rule) = self.agent_rules.get(agent_id).and_then(|rules| rules.get(tool_name)) {
                return Some(rule);
            }
        }
        self.global_rules.get(tool_name)
    }

    /// Evaluate the rule for `tool_name` against `input_json`, without
    /// resolving an `Ask` verdict. Agent-scoped rules win over global;
    /// within a pattern map, the most specific (non-`*`) matching glob
    /// wins over the `*` default.
    pub fn evaluate(&self, agent_id: Option<&str>, tool_name: &str, input_json: &str) -> Decision {
        let Some(rule) = self.rule_for(agent_id, tool_name) else {
            return Decision::Ask;
        };

        match rule {
            PermissionRule::Flat(action) => parse_action(action),
            PermissionRule::ByPattern(patterns) => {
                let canonical = Self::canonicalize_input(input_json);
                let mut candidates: Vec<(&String, &String)> = patterns.iter().filter(|(k, _)| *k != "*").collect();
                candidates.sort_by_key(|(pattern, _)| std::cmp::Reverse(pattern.len()));

                for (pattern, action) in candidates {
                    if let Ok(glob) = Glob::new(pattern) {
                        if glob.compile_matcher().is_match(&canonical) {
                            return parse_action(action);
                        }
                    }
                }
                patterns.get("*").map(|a| parse_action(a)).unwrap_or(Decision::Ask)
            }
        }
    }

    /// Evaluate, and if the result is `Ask`, drive the installed
    /// `AskHandler` to a final allow/deny.
    pub async fn request(
        &self,
        agent_id: Option<&str>,
        tool_name: &str,
        input_json: &str,
    ) -> Result<bool, PermissionError> {
        match self.evaluate(agent_id, tool_name, input_json) {
            Decision::Allow => Ok(true),
            Decision::Deny => Ok(false),
            Decision::Ask => match &self.asker {
                Some(asker) => {
                    let canonical = Self::canonicalize_input(input_json);
                    Ok(asker.ask(agent_id, tool_name, &canonical).await)
                }
                None => Err(PermissionError::NoAskHandler(tool_name.to_string())),
            },
        }
    }
}

fn parse_action(action: &str) -> Decision {
    match action {
        "allow" => Decision::Allow,
        "deny" => Decision::Deny,
        _ => Decision::Ask,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broker_with_global(rules: HashMap<String, PermissionRule>) -> PermissionBroker {
        PermissionBroker::new(PermissionConfig { rules }, HashMap::new())
    }

    #[test]
    fn flat_rule_resolves_directly() {
        let mut rules = HashMap::new();
        rules.insert("bash".to_string(), PermissionRule::Flat("ask".to_string()));
        let broker = broker_with_global(rules);
        assert_eq!(broker.evaluate(None, "bash", "{}"), Decision::Ask);
    }

    #[test]
    fn missing_rule_defaults_to_ask() {
        let broker = broker_with_global(HashMap::new());
        assert_eq!(broker.evaluate(None, "write", "{}"), Decision::Ask);
    }

    #[test]
    fn most_specific_pattern_wins_over_star() {
        let mut patterns = HashMap::new();
        patterns.insert("*".to_string(), "ask".to_string());
        patterns.insert("{\"path\":\"*.md\"}".to_string(), "allow".to_string());
        let mut rules = HashMap::new();
        rules.insert("write".to_string(), PermissionRule::ByPattern(patterns));
        let broker = broker_with_global(rules);

        let decision = broker.evaluate(None, "write", r#"{"path":"notes.md"}"#);
        assert_eq!(decision, Decision::Allow);

        let decision = broker.evaluate(None, "write", r#"{"path":"main.rs"}"#);
        assert_eq!(decision, Decision::Ask);
    }

    #[test]
    fn agent_scoped_rule_takes_precedence_over_global() {
        let mut global = HashMap::new();
        global.insert("bash".to_string(), PermissionRule::Flat("deny".to_string()));

        let mut agent_specific = HashMap::new();
        agent_specific.insert("bash".to_string(), PermissionRule::Flat("allow".to_string()));
        let mut agent_rules = HashMap::new();
        agent_rules.insert("explorer".to_string(), agent_specific);

        let broker = PermissionBroker::new(PermissionConfig { rules: global }, agent_rules);
        assert_eq!(broker.evaluate(Some("explorer"), "bash", "{}"), Decision::Allow);
        assert_eq!(broker.evaluate(Some("other-agent"), "bash", "{}"), Decision::Deny);
    }

    #[tokio::test]
    async fn request_drives_ask_handler() {
        struct AlwaysAllow;
        #[async_trait]
        impl AskHandler for AlwaysAllow {
            async fn ask(&self, _agent_id: Option<&str>, _tool_name: &str, _canonical_input: &str) -> bool {
                true
            }
        }

        let mut rules = HashMap::new();
        rules.insert("bash".to_string(), PermissionRule::Flat("ask".to_string()));
        let broker = broker_with_global(rules).with_ask_handler(Arc::new(AlwaysAllow));
        let allowed = broker.request(None, "bash", "{}").await.expect("resolved");
        assert!(allowed);
    }

    #[tokio::test]
    async fn request_without_ask_handler_errors() {
        let mut rules = HashMap::new();
        rules.insert("bash".to_string(), PermissionRule::Flat("ask".to_string()));
        let broker = broker_with_global(rules);
        let err = broker.request(None, "bash", "{}").await.unwrap_err();
        assert!(matches!(err, PermissionError::NoAskHandler(_)));
    }

    #[test]
    fn canonicalize_input_sorts_keys() {
        let canonical = PermissionBroker::canonicalize_input(r#"{"b":1,"a":2}"#);
        assert_eq!(canonical, r#"{"a":2,"b":1}"#);
    }
}
