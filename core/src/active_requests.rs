//! The active-requests map (§5): one `CancellationToken` per `session_id`
//! (+ a `-summarize` sibling key used while auto-compaction is in flight),
//! protected by a fine-grained concurrent map rather than one global lock.

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct ActiveRequests {
    tokens: DashMap<String, CancellationToken>,
}

impl ActiveRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token under `key`. Fails (the `session_busy` guard)
    /// if a request is already registered under this exact key.
    pub fn register(&self, key: &str) -> Option<CancellationToken> {
        if self.tokens.contains_key(key) {
            return None;
        }
        let token = CancellationToken::new();
        self.tokens.insert(key.to_string(), token.clone());
        Some(token)
    }

    pub fn unregister(&self, key: &str) {
        self.tokens.remove(key);
    }

    /// Cancel the in-flight request under `key`, if any. Returns whether a
    /// token was found.
    pub fn cancel(&self, key: &str) -> bool {
        match self.tokens.get(key) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.tokens.contains_key(key)
    }
}

/// Key under which a `(session_id, agent_id)` pair's request is registered.
pub fn request_key(session_id: &str, agent_id: &str) -> String {
    format!("{session_id}:{agent_id}")
}

/// The sibling key guarding an in-flight auto-compaction summarization for
/// the same session/agent pair.
pub fn summarize_key(session_id: &str, agent_id: &str) -> String {
    format!("{session_id}:{agent_id}-summarize")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_twice_under_the_same_key_fails() {
        let active = ActiveRequests::new();
        assert!(active.register("s1:a1").is_some());
        assert!(active.register("s1:a1").is_none());
    }

    #[test]
    fn unregister_frees_the_key_for_reuse() {
        let active = ActiveRequests::new();
        active.register("s1:a1").expect("first registration");
        active.unregister("s1:a1");
        assert!(active.register("s1:a1").is_some());
    }

    #[test]
    fn cancel_cancels_the_registered_token() {
        let active = ActiveRequests::new();
        let token = active.register("s1:a1").expect("registered");
        assert!(!token.is_cancelled());
        assert!(active.cancel("s1:a1"));
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_on_unknown_key_returns_false() {
        let active = ActiveRequests::new();
        assert!(!active.cancel("missing"));
    }

    #[test]
    fn request_and_summarize_keys_are_distinct() {
        assert_ne!(request_key("s1", "a1"), summarize_key("s1", "a1"));
    }
}
