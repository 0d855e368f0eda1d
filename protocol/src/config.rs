//! The merged configuration surface. One `Config` value is constructed
//! once at startup by the loader (in `hive-cli`) and handed down as
//! `Arc<Config>`; no other component reads environment or files directly.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

fn default_data_directory() -> String {
    ".opencode".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    Agent,
    Subagent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
    #[serde(rename = "baseURL")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub model: String,
    #[serde(rename = "maxTokens")]
    pub max_tokens: Option<u32>,
    #[serde(rename = "reasoningEffort")]
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Agent-scoped rules, keyed by tool name, in the same shape as
    /// `permission.rules`. These take precedence over the global rules
    /// for this agent.
    #[serde(default)]
    pub permission: HashMap<String, PermissionRule>,
    #[serde(default)]
    pub tools: Vec<String>,
    pub mode: Option<AgentMode>,
    pub prompt: Option<String>,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LspServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub initialization: Option<serde_json::Value>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpServerType {
    Stdio,
    Sse,
    Http,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(rename = "type")]
    pub server_type: Option<McpServerType>,
    pub url: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TuiConfig {
    pub theme: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShellConfig {
    pub path: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionProviderType {
    Sqlite,
    Mysql,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MysqlConfig {
    pub dsn: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(rename = "maxConnections")]
    pub max_connections: Option<u32>,
    #[serde(rename = "maxIdleConnections")]
    pub max_idle_connections: Option<u32>,
    #[serde(rename = "connectionTimeout")]
    pub connection_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: SessionProviderType,
    #[serde(default)]
    pub mysql: MysqlConfig,
}

impl Default for SessionProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: SessionProviderType::Sqlite,
            mysql: MysqlConfig::default(),
        }
    }
}

/// A permission rule is either a flat action or a map of glob patterns
/// (matched against a canonical stringification of the tool input) to
/// actions. See the broker crate for evaluation precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionRule {
    Flat(String),
    ByPattern(HashMap<String, String>),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionConfig {
    #[serde(default)]
    pub rules: HashMap<String, PermissionRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillsConfig {
    #[serde(default)]
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "data", default)]
    pub data: DataConfig,
    #[serde(default = "default_wd")]
    pub wd: String,
    #[serde(rename = "contextPaths", default)]
    pub context_paths: Vec<String>,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub agents: HashMap<String, AgentConfig>,
    #[serde(default)]
    pub lsp: HashMap<String, LspServerConfig>,
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: HashMap<String, McpServerConfig>,
    #[serde(default)]
    pub tui: TuiConfig,
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(rename = "autoCompact", default = "default_auto_compact")]
    pub auto_compact: f64,
    #[serde(rename = "disableLSPDownload", default)]
    pub disable_lsp_download: bool,
    #[serde(rename = "sessionProvider", default)]
    pub session_provider: SessionProviderConfig,
    #[serde(default)]
    pub permission: PermissionConfig,
    #[serde(default)]
    pub skills: SkillsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_directory")]
    pub directory: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            directory: default_data_directory(),
        }
    }
}

fn default_wd() -> String {
    ".".to_string()
}

fn default_auto_compact() -> f64 {
    0.95
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            wd: default_wd(),
            context_paths: Vec::new(),
            providers: HashMap::new(),
            agents: HashMap::new(),
            lsp: HashMap::new(),
            mcp_servers: HashMap::new(),
            tui: TuiConfig::default(),
            shell: ShellConfig::default(),
            auto_compact: default_auto_compact(),
            disable_lsp_download: false,
            session_provider: SessionProviderConfig::default(),
            permission: PermissionConfig::default(),
            skills: SkillsConfig::default(),
        }
    }
}

impl Config {
    /// Merge `overlay` onto `self`, field by field, with maps merged key
    /// by key (overlay entries win) rather than replaced wholesale. Used
    /// to layer a project-local config file over the global one.
    pub fn merge(mut self, overlay: Config) -> Config {
        if overlay.data.directory != default_data_directory() {
            self.data.directory = overlay.data.directory;
        }
        if overlay.wd != default_wd() {
            self.wd = overlay.wd;
        }
        if !overlay.context_paths.is_empty() {
            self.context_paths = overlay.context_paths;
        }
        self.providers.extend(overlay.providers);
        self.agents.extend(overlay.agents);
        self.lsp.extend(overlay.lsp);
        self.mcp_servers.extend(overlay.mcp_servers);
        if overlay.tui.theme.is_some() {
            self.tui.theme = overlay.tui.theme;
        }
        if overlay.shell.path.is_some() {
            self.shell = overlay.shell;
        }
        if (overlay.auto_compact - default_auto_compact()).abs() > f64::EPSILON {
            self.auto_compact = overlay.auto_compact;
        }
        self.disable_lsp_download = overlay.disable_lsp_download || self.disable_lsp_download;
        self.permission.rules.extend(overlay.permission.rules);
        if !overlay.skills.paths.is_empty() {
            self.skills.paths.extend(overlay.skills.paths);
        }
        self
    }
}
