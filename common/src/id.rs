//! Collision-resistant identifiers for messages, sessions, and tasks.
//!
//! IDs are UUIDv4 rendered without hyphens, optionally prefixed (e.g.
//! `msg_...`, `ses_...`) so that logs and persisted JSON are easy to
//! eyeball without a schema in hand.

use uuid::Uuid;

/// Generate a bare collision-resistant ID.
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Generate an ID with a short, human-legible prefix, e.g. `new_id_with_prefix("msg")`.
pub fn new_id_with_prefix(prefix: &str) -> String {
    format!("{prefix}_{}", new_id())
}
