//! Layered configuration (§4.11, §6): a global config file, a
//! project-local one, and environment-variable overrides, merged into one
//! [`Config`] via [`Config::merge`]. A missing optional file is not an
//! error; a present-but-malformed one is.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use hive_protocol::Config;

/// Default global config path: `<os config dir>/hive/config.json`. Falls
/// back to `~/.hive/config.json` if the platform config dir can't be
/// resolved (e.g. `$HOME` unset).
pub fn default_global_path() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".config")).join("hive").join("config.json")
}

/// Default project-local config path: `<workspace_root>/.hive.json`.
pub fn default_local_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".hive.json")
}

fn read_optional(path: &Path) -> anyhow::Result<Config> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            serde_json::from_str(&contents).map_err(|err| anyhow::anyhow!("malformed config at {}: {err}", path.display()))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
        Err(err) => Err(anyhow::anyhow!("reading config at {}: {err}", path.display())),
    }
}

/// Load and merge `global_path` then `local_path`, local taking
/// precedence, then apply environment-variable overrides.
pub fn load(global_path: &Path, local_path: &Path) -> anyhow::Result<Config> {
    let global = read_optional(global_path)?;
    let local = read_optional(local_path)?;
    let mut config = global.merge(local);
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Apply the environment-variable overrides named in §6. Reads the
/// process environment directly since this is the one place in the
/// workspace allowed to: every other component receives an already-built
/// `Config`.
pub fn apply_env_overrides(config: &mut Config) {
    for (key, value) in std::env::vars() {
        let Some(prefix) = key.strip_suffix("_API_KEY") else { continue };
        if prefix.is_empty() {
            continue;
        }
        let provider_name = prefix.to_lowercase();
        config.providers.entry(provider_name).or_default().api_key = Some(value);
    }

    if std::env::var_os("OPENCODE_DISABLE_LSP_DOWNLOAD").is_some() {
        config.disable_lsp_download = true;
    }

    if let Ok(provider_type) = std::env::var("OPENCODE_SESSION_PROVIDER_TYPE") {
        if let Ok(parsed) = serde_json::from_value::<hive_protocol::config::SessionProviderType>(serde_json::Value::String(provider_type)) {
            config.session_provider.provider_type = parsed;
        }
    }

    if let Ok(dsn) = std::env::var("OPENCODE_MYSQL_DSN") {
        config.session_provider.mysql.dsn = Some(dsn);
    }
}

/// Per-agent permission rule maps, keyed by agent name, derived from
/// `config.agents.*.permission` — the shape `PermissionBroker::new` wants
/// its second argument in.
pub fn agent_permission_rules(config: &Config) -> HashMap<String, HashMap<String, hive_protocol::config::PermissionRule>> {
    config.agents.iter().map(|(name, agent)| (name.clone(), agent.permission.clone())).collect()
}
