//! Process lifetime (§4, "CLI entrypoint (ambient)"): load config, build
//! the component graph, drive the Agent Loop from a single prompt or from
//! stdin, and print the assistant's final text after each turn.

use std::io::IsTerminal;

use hive_protocol::FinishReason;
use hive_protocol::Session;
use hive_state::MessageStore;
use hive_state::SessionStore;
use hive_state::StoreError;
use tokio::io::AsyncBufReadExt;

use crate::cli::Cli;
use crate::config_loader;
use crate::wiring;
use crate::wiring::Components;

async fn get_or_create_session(components: &Components, session_id: &str) -> anyhow::Result<()> {
    match components.sessions.get(session_id).await {
        Ok(_) => Ok(()),
        Err(StoreError::SessionNotFound(_)) => {
            tracing::info!(session_id, "creating new session");
            let session = Session::new_root(session_id.to_string(), "cli session", chrono::Utc::now());
            components.sessions.create(session).await?;
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

async fn print_last_assistant_text(components: &Components, session_id: &str) -> anyhow::Result<()> {
    let history = components.messages.list_for_session(session_id).await?;
    if let Some(message) = history.iter().rev().find(|m| m.role == hive_protocol::Role::Assistant) {
        println!("{}", hive_core::context::message_text(message));
    }
    Ok(())
}

/// Run one turn, printing its result and a diagnostic on a non-`end_turn`
/// finish reason.
async fn run_one_turn(components: &Components, agent: &str, session_id: &str, text: &str) -> anyhow::Result<()> {
    let finish = components.agent_loop.run_turn(session_id, agent, text).await?;
    print_last_assistant_text(components, session_id).await?;
    if !matches!(finish, FinishReason::EndTurn) {
        eprintln!("(turn ended with {finish:?})");
    }
    Ok(())
}

pub async fn main(cli: Cli) -> anyhow::Result<()> {
    let workspace_root = match &cli.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    let global_path = cli.config.clone().unwrap_or_else(config_loader::default_global_path);
    let local_path = cli.local_config.clone().unwrap_or_else(|| config_loader::default_local_path(&workspace_root));
    let config = config_loader::load(&global_path, &local_path)?;

    if std::env::var_os("OPENCODE_DEV_DEBUG").is_some() && std::env::var_os("RUST_LOG").is_none() {
        // Safety: single-threaded at this point in startup, before any
        // subscriber or worker task reads the environment.
        unsafe { std::env::set_var("RUST_LOG", "debug") };
    }

    let timezone = if cli.utc { hive_common::TimezoneConfig::Utc } else { hive_common::TimezoneConfig::Local };
    let data_dir = workspace_root.join(&config.data.directory);
    std::fs::create_dir_all(&data_dir)?;
    hive_common::init_tracing(timezone, Some(&data_dir.join("debug.log")));

    let components = wiring::build(config, &workspace_root).await?;
    tracing::info!(workspace = %workspace_root.display(), "component graph built");
    let session_id = cli.session.clone().unwrap_or_else(|| hive_common::new_id_with_prefix("ses"));
    get_or_create_session(&components, &session_id).await?;

    let agent_loop = components.agent_loop.clone();
    let cancel_session = session_id.clone();
    let cancel_agent = cli.agent.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            agent_loop.cancel(&cancel_session, &cancel_agent);
        }
    });

    if let Some(prompt) = &cli.prompt {
        run_one_turn(&components, &cli.agent, &session_id, prompt).await?;
        return Ok(());
    }

    if std::io::stdin().is_terminal() {
        eprintln!("reading prompts from stdin (ctrl-d to exit, ctrl-c to cancel the current turn)");
    }

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        run_one_turn(&components, &cli.agent, &session_id, line).await?;
    }

    Ok(())
}
