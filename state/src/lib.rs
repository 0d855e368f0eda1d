//! Session/message store and task planner store, with an in-memory
//! backend for tests and single-process runs and a SQL backend shared
//! between the `sqlite` and `mysql` session providers.

pub mod error;
pub mod memory;
pub mod sql;
pub mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sql::SqlStore;
pub use traits::MessageStore;
pub use traits::SessionStore;
pub use traits::TaskStore;
