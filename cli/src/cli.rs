//! Argument parsing (§4, "CLI entrypoint (ambient)").

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "hive", about = "Drive the hive agent loop from a single prompt or stdin")]
pub struct Cli {
    /// Workspace root the File Sandbox and LSP Pool are confined to.
    /// Defaults to the current directory.
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Global config file. Defaults to the platform config directory.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Project-local config file. Defaults to `<cwd>/.hive.json`.
    #[arg(long = "local-config")]
    pub local_config: Option<PathBuf>,

    /// Render log timestamps in UTC instead of local time.
    #[arg(long)]
    pub utc: bool,

    /// Agent to run the turn(s) as.
    #[arg(long, default_value = "hivemind")]
    pub agent: String,

    /// Session id to continue. A fresh id is generated if omitted.
    #[arg(long)]
    pub session: Option<String>,

    /// A single prompt to run to completion. If omitted, lines are read
    /// from stdin and each one runs as a turn in the same session until
    /// EOF.
    pub prompt: Option<String>,
}
