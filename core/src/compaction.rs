//! Auto-compaction (§4.8 step 2, §9): when assembled context crosses the
//! configured window threshold, a summary replaces prior messages. A
//! `CompactStrategy` is the extension point for how that summary is built
//! and phrased; only one is registered today, but the trait keeps the
//! substitution point explicit rather than inlining the prompt string.

use chrono::DateTime;
use chrono::Utc;
use hive_protocol::Message;
use hive_protocol::Role;

/// Everything a strategy needs to phrase its summarization request and
/// build the replacement history, without reaching back into the loop.
pub struct CompactContext<'a> {
    pub session_id: &'a str,
    pub user_texts: &'a [String],
}

pub trait CompactStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// The prompt sent to the summarizer agent in place of the user's turn.
    fn generate_prompt(&self, ctx: &CompactContext<'_>) -> String;

    /// Build the system-role message that replaces the compacted history.
    /// `summary_text` is the summarizer agent's final response text.
    fn build_summary_message(&self, id: String, session_id: &str, summary_text: &str, now: DateTime<Utc>) -> Message;
}

/// The only strategy this workspace ships: a handoff-focused summary with
/// no special file-recovery behavior.
pub struct SimpleStrategy;

impl CompactStrategy for SimpleStrategy {
    fn name(&self) -> &str {
        "simple"
    }

    fn generate_prompt(&self, ctx: &CompactContext<'_>) -> String {
        let mut prompt = String::from(
            "Summarize this conversation so a new assistant turn can continue it without the full \
             history: preserve the user's goals, decisions already made, files touched, and any open \
             questions. Be concise but do not drop technical detail.",
        );
        if !ctx.user_texts.is_empty() {
            prompt.push_str("\n\nUser turns so far:\n");
            for text in ctx.user_texts {
                prompt.push_str("- ");
                prompt.push_str(text);
                prompt.push('\n');
            }
        }
        prompt
    }

    fn build_summary_message(&self, id: String, session_id: &str, summary_text: &str, now: DateTime<Utc>) -> Message {
        let mut message = Message::new(id, session_id, Role::System, now);
        message
            .append_text_delta(&format!("Conversation summary (auto-compacted):\n{summary_text}"), now)
            .expect("a freshly constructed message is always open");
        message
    }
}

/// Fraction of the model's context window, 0.0-1.0, past which assembly
/// must trigger compaction before the next turn. Kept configurable
/// (`Config::auto_compact`) rather than hardcoded, per the open question
/// in the design notes.
pub fn exceeds_threshold(estimated_tokens: usize, window_tokens: usize, threshold: f64) -> bool {
    (estimated_tokens as f64) >= (window_tokens as f64) * threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_prior_user_turns() {
        let ctx = CompactContext {
            session_id: "s1",
            user_texts: &["fix the bug".to_string(), "also add a test".to_string()],
        };
        let prompt = SimpleStrategy.generate_prompt(&ctx);
        assert!(prompt.contains("fix the bug"));
        assert!(prompt.contains("also add a test"));
    }

    #[test]
    fn summary_message_is_system_role_and_finished_is_false() {
        let now = Utc::now();
        let message = SimpleStrategy.build_summary_message("msg_1".into(), "s1", "did X, then Y", now);
        assert_eq!(message.role, Role::System);
        assert!(!message.is_finished());
    }

    #[test]
    fn threshold_crossing_is_inclusive_at_the_boundary() {
        assert!(exceeds_threshold(950, 1000, 0.95));
        assert!(!exceeds_threshold(949, 1000, 0.95));
    }
}
