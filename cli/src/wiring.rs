//! Component-graph construction: Sandbox, Permission Broker, stores, LSP
//! Pool, and the Agent Loop, all built from one resolved [`Config`] and
//! handed down as `Arc`s (§4, data-flow paragraph).

use std::path::Path;
use std::sync::Arc;

use hive_core::AgentLoop;
use hive_core::AgentLoopDeps;
use hive_core::AgentRegistry;
use hive_core::SimpleStrategy;
use hive_permission::PermissionBroker;
use hive_protocol::config::SessionProviderType;
use hive_protocol::Config;
use hive_state::MessageStore;
use hive_state::SessionStore;
use hive_state::SqlStore;
use hive_state::TaskStore;

use crate::config_loader::agent_permission_rules;

pub struct Components {
    pub config: Arc<Config>,
    pub bus: Arc<hive_common::Bus>,
    pub agent_loop: Arc<AgentLoop>,
    pub sessions: Arc<dyn SessionStore>,
    pub messages: Arc<dyn MessageStore>,
}

/// Build the sqlite/mysql DSN for `config.session_provider`. Sqlite has no
/// explicit DSN field (only Mysql does), so it's derived from
/// `data.directory`; Mysql prefers an explicit `dsn` and otherwise
/// assembles one from the discrete host/port/database/credential fields.
fn session_provider_dsn(config: &Config, data_dir: &Path) -> anyhow::Result<String> {
    match config.session_provider.provider_type {
        // `mode=rwc`: create the database file if it doesn't exist yet,
        // matching `SqlStore::connect`'s `CREATE TABLE IF NOT EXISTS` schema
        // bootstrap — first run on a fresh `data.directory` must succeed.
        SessionProviderType::Sqlite => Ok(format!("sqlite://{}?mode=rwc", data_dir.join("hive.db").display())),
        SessionProviderType::Mysql => {
            let mysql = &config.session_provider.mysql;
            if let Some(dsn) = &mysql.dsn {
                return Ok(dsn.clone());
            }
            let host = mysql.host.as_deref().unwrap_or("127.0.0.1");
            let port = mysql.port.unwrap_or(3306);
            let database = mysql.database.as_deref().ok_or_else(|| anyhow::anyhow!("mysql session provider requires a database name or dsn"))?;
            let credentials = match (&mysql.username, &mysql.password) {
                (Some(user), Some(pass)) => format!("{user}:{pass}@"),
                (Some(user), None) => format!("{user}@"),
                _ => String::new(),
            };
            Ok(format!("mysql://{credentials}{host}:{port}/{database}"))
        }
    }
}

/// Build every component the Agent Loop depends on. `workspace_root` is
/// the canonical root the File Sandbox and LSP Pool are confined to.
pub async fn build(config: Config, workspace_root: &Path) -> anyhow::Result<Components> {
    let config = Arc::new(config);
    let bus = Arc::new(hive_common::Bus::default());

    let data_dir = workspace_root.join(&config.data.directory);
    std::fs::create_dir_all(&data_dir)?;

    let dsn = session_provider_dsn(&config, &data_dir)?;
    let store = Arc::new(SqlStore::connect(&dsn, bus.clone()).await?);

    let sandbox = Arc::new(hive_sandbox::FileSandbox::new(workspace_root)?);
    let permissions = Arc::new(PermissionBroker::new(config.permission.clone(), agent_permission_rules(&config)));
    let tools = Arc::new(hive_tools::default_registry());
    let agents = Arc::new(AgentRegistry::from_config(&config)?);
    let lsp = Some(hive_lsp::LspPool::init(workspace_root, &config).await);

    let deps = AgentLoopDeps {
        config: config.clone(),
        agents,
        sessions: store.clone() as Arc<dyn SessionStore>,
        messages: store.clone() as Arc<dyn MessageStore>,
        tasks: store.clone() as Arc<dyn TaskStore>,
        tools,
        permissions,
        sandbox,
        lsp,
        compact_strategy: Arc::new(SimpleStrategy),
    };
    let agent_loop = Arc::new(AgentLoop::new(deps));

    Ok(Components {
        config,
        bus,
        agent_loop,
        sessions: store.clone() as Arc<dyn SessionStore>,
        messages: store as Arc<dyn MessageStore>,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_dsn_is_derived_from_data_directory() {
        let config = Config::default();
        let dsn = session_provider_dsn(&config, Path::new("/tmp/wd/.opencode")).expect("dsn");
        assert_eq!(dsn, "sqlite:///tmp/wd/.opencode/hive.db?mode=rwc");
    }

    #[test]
    fn mysql_without_dsn_or_database_is_rejected() {
        let mut config = Config::default();
        config.session_provider.provider_type = SessionProviderType::Mysql;
        let err = session_provider_dsn(&config, Path::new("/tmp")).unwrap_err();
        assert!(err.to_string().contains("database"));
    }

    #[test]
    fn mysql_dsn_assembled_from_discrete_fields() {
        let mut config = Config::default();
        config.session_provider.provider_type = SessionProviderType::Mysql;
        config.session_provider.mysql.host = Some("db.internal".to_string());
        config.session_provider.mysql.database = Some("hive".to_string());
        config.session_provider.mysql.username = Some("svc".to_string());
        config.session_provider.mysql.password = Some("pw".to_string());
        let dsn = session_provider_dsn(&config, Path::new("/tmp")).expect("dsn");
        assert_eq!(dsn, "mysql://svc:pw@db.internal:3306/hive");
    }
}
