//! Context assembly (§4.8 step 2): system prompt for the agent role,
//! configured context files, and the conversation tail, truncated to fit
//! the model's context window.

use chrono::DateTime;
use chrono::Utc;
use hive_protocol::Message;
use hive_protocol::Role;
use hive_sandbox::FileSandbox;

/// Tokens are approximated at 4 chars/token, the same ratio the tool
/// runtime's truncation cap uses, so the two budgets stay comparable.
const CHARS_PER_TOKEN: usize = 4;

pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Concatenate the readable text of a message's parts: prose, reasoning,
/// and tool call/result payloads. Used both for token estimation and to
/// pull a subagent's final answer back out of its transcript.
pub fn message_text(message: &Message) -> String {
    let mut text = String::new();
    for part in message.parts() {
        match part {
            hive_protocol::Part::Text { text: t } => text.push_str(t),
            hive_protocol::Part::Reasoning { thinking } => text.push_str(thinking),
            hive_protocol::Part::ToolCall { name, input, .. } => {
                text.push_str(name);
                text.push_str(input);
            }
            hive_protocol::Part::ToolResult { content, .. } => text.push_str(content),
            _ => {}
        }
    }
    text
}

/// Read every configured context path, skipping any that don't resolve or
/// can't be read rather than failing the whole assembly — a stale or
/// misconfigured context path should degrade gracefully, not block a turn.
pub fn read_context_files(sandbox: &FileSandbox, paths: &[String], now: DateTime<Utc>) -> Vec<(String, String)> {
    paths
        .iter()
        .filter_map(|path| sandbox.safe_read(path, now).ok().map(|content| (path.clone(), content)))
        .collect()
}

fn build_system_message(id: String, session_id: &str, agent_prompt: &str, context_files: &[(String, String)], now: DateTime<Utc>) -> Message {
    let mut message = Message::new(id, session_id, Role::System, now);
    let mut text = agent_prompt.to_string();
    for (path, content) in context_files {
        text.push_str("\n\n--- ");
        text.push_str(path);
        text.push_str(" ---\n");
        text.push_str(content);
    }
    message
        .append_text_delta(&text, now)
        .expect("a freshly constructed message is always open");
    message
}

/// Assemble `[system, ...tail]` truncated to `window_tokens`, and return
/// the estimated token count of what was kept plus the user-turn texts
/// dropped from the tail (handed to auto-compaction if this assembly is
/// later found to exceed the threshold).
pub fn assemble(
    system_id: String,
    session_id: &str,
    agent_prompt: &str,
    context_files: &[(String, String)],
    history: &[Message],
    window_tokens: usize,
    now: DateTime<Utc>,
) -> (Vec<Message>, usize) {
    let system = build_system_message(system_id, session_id, agent_prompt, context_files, now);
    let mut budget = window_tokens.saturating_sub(estimate_tokens(&message_text(&system)));

    let mut tail: Vec<Message> = Vec::new();
    for message in history.iter().rev() {
        let cost = estimate_tokens(&message_text(message));
        if cost > budget && !tail.is_empty() {
            break;
        }
        budget = budget.saturating_sub(cost);
        tail.push(message.clone());
    }
    tail.reverse();

    let total_tokens = estimate_tokens(&message_text(&system)) + tail.iter().map(|m| estimate_tokens(&message_text(m))).sum::<usize>();

    let mut assembled = Vec::with_capacity(tail.len() + 1);
    assembled.push(system);
    assembled.extend(tail);
    (assembled, total_tokens)
}

/// Restrict `history` to the compaction summary message onward. The
/// underlying store is append-only, so a summary doesn't erase what it
/// replaces — this is what makes the replacement effective for the next
/// assembly instead.
pub fn history_since(history: &[Message], summary_message_id: Option<&str>) -> Vec<Message> {
    let Some(id) = summary_message_id else {
        return history.to_vec();
    };
    match history.iter().position(|m| m.id == id) {
        Some(index) => history[index..].to_vec(),
        None => history.to_vec(),
    }
}

/// User-role message texts extracted from history, oldest first — fed to
/// the compact strategy's summarization prompt.
pub fn user_texts(history: &[Message]) -> Vec<String> {
    history
        .iter()
        .filter(|m| m.role == Role::User)
        .map(message_text)
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: Role, text: &str) -> Message {
        let now = Utc::now();
        let mut m = Message::new(hive_common::new_id_with_prefix("msg"), "s1", role, now);
        m.append_text_delta(text, now).expect("open");
        m
    }

    #[test]
    fn assembled_context_leads_with_the_system_message() {
        let history = vec![msg(Role::User, "hi")];
        let (assembled, _) = assemble("m0".into(), "s1", "be terse", &[], &history, 10_000, Utc::now());
        assert_eq!(assembled[0].role, Role::System);
        assert_eq!(assembled.len(), 2);
    }

    #[test]
    fn tail_is_truncated_to_fit_a_tiny_window() {
        let history: Vec<Message> = (0..50).map(|i| msg(Role::User, &format!("message number {i} with some padding text"))).collect();
        let (assembled, total_tokens) = assemble("m0".into(), "s1", "system", &[], &history, 50, Utc::now());
        assert!(assembled.len() < history.len() + 1);
        assert!(total_tokens <= 50 + 20, "budget is approximate, not exact: {total_tokens}");
    }

    #[test]
    fn at_least_the_most_recent_message_is_always_kept() {
        let history = vec![msg(Role::User, &"x".repeat(10_000))];
        let (assembled, _) = assemble("m0".into(), "s1", "system", &[], &history, 1, Utc::now());
        assert_eq!(assembled.len(), 2);
    }

    #[test]
    fn history_since_drops_everything_before_the_summary() {
        let history = vec![msg(Role::User, "old 1"), msg(Role::User, "old 2"), msg(Role::System, "summary")];
        let summary_id = history[2].id.clone();
        let kept = history_since(&history, Some(&summary_id));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, summary_id);
    }

    #[test]
    fn history_since_with_no_summary_keeps_everything() {
        let history = vec![msg(Role::User, "a"), msg(Role::User, "b")];
        assert_eq!(history_since(&history, None).len(), 2);
    }

    #[test]
    fn user_texts_extracts_only_user_role_messages() {
        let history = vec![msg(Role::User, "do X"), msg(Role::Assistant, "done"), msg(Role::User, "do Y")];
        let texts = user_texts(&history);
        assert_eq!(texts, vec!["do X".to_string(), "do Y".to_string()]);
    }
}
