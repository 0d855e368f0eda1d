//! Shared primitives used by every crate in the workspace: monotonic
//! timestamps, collision-resistant IDs, structured logging setup, and the
//! in-process pub/sub bus that lets a UI (or a test) observe session,
//! message, and log events without coupling to the agent loop directly.

pub mod clock;
pub mod id;
pub mod logging;
pub mod pubsub;

pub use clock::Clock;
pub use clock::SystemClock;
pub use id::new_id;
pub use id::new_id_with_prefix;
pub use logging::TimezoneConfig;
pub use logging::init_tracing;
pub use pubsub::Bus;
pub use pubsub::Event;
pub use pubsub::Topic;
