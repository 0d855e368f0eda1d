//! Process entrypoint: argument parsing, layered config loading, the
//! Sandbox/Broker/Stores/Pool/Provider/Runtime/Loop component graph, and
//! the stdin/single-prompt driver that owns process lifetime (§4, §4.11).

pub mod cli;
pub mod config_loader;
pub mod run;
pub mod wiring;

pub use cli::Cli;
pub use wiring::Components;
