use crate::middleware::auth::AuthGate;
use anyhow::{bail, Context, Result};
use puzzlecats_mcp::providers::{parse_list, GithubAdapter, GithubConfig, SlackAdapter, SlackConfig};
use puzzlecats_mcp::tools::{PulseConfig, ToolRegistry};
use puzzlecats_mcp::McpServer;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ListenConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub slack: SlackConfig,

    #[serde(default)]
    pub github: GithubConfig,

    #[serde(default)]
    pub pulse: PulseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Path of the streamed MCP endpoint
    #[serde(default = "default_mcp_path")]
    pub mcp_path: String,

    /// Directory served under `/connect`
    #[serde(default = "default_connect_dir")]
    pub connect_dir: PathBuf,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_mcp_path() -> String {
    "/mcp".to_string()
}

fn default_connect_dir() -> PathBuf {
    PathBuf::from("./public/connect")
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            mcp_path: default_mcp_path(),
            connect_dir: default_connect_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer secret every MCP connection must present
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl ServerConfig {
    /// Load the config file if it exists, otherwise use defaults
    pub fn load(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read configuration file {}", config_path.display()))?;
            toml::from_str(&content).context("Failed to parse configuration file")
        } else {
            tracing::info!("Configuration file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Overlay environment variables. Empty values count as unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("MCP_API_KEY") {
            self.auth.api_key = Some(key);
        }
        if let Some(host) = get("HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT value: {}", port))?;
        }
        if let Some(path) = get("MCP_PATH") {
            self.server.mcp_path = path;
        }
        if let Some(dir) = get("CONNECT_DIR") {
            self.server.connect_dir = PathBuf::from(dir);
        }

        if let Some(token) = get("SLACK_XOXP_TOKEN") {
            self.slack.token = Some(token);
        }
        if let Some(channels) = get("SLACK_CHANNEL_ALLOWLIST") {
            self.slack.channel_allowlist = parse_list(&channels);
        }
        if let Some(url) = get("SLACK_API_URL") {
            self.slack.api_url = url;
        }

        if let Some(token) = get("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(repos) = get("GITHUB_REPOS") {
            self.github.repos = parse_list(&repos);
        }
        if let Some(url) = get("GITHUB_API_URL") {
            self.github.api_url = url;
        }

        if let Some(secs) = get("PULSE_SOURCE_TIMEOUT_SECS") {
            self.pulse.source_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid PULSE_SOURCE_TIMEOUT_SECS value: {}", secs))?;
        }

        Ok(())
    }

    /// Normalize the MCP path and reject settings that cannot be routed
    pub fn validate(&mut self) -> Result<()> {
        let path = self.server.mcp_path.trim().trim_end_matches('/');
        self.server.mcp_path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        let path = self.server.mcp_path.as_str();
        if path == "/" || path == "/health" || path == "/connect" || path.starts_with("/connect/") {
            bail!("MCP path {} collides with a built-in route", path);
        }

        if self.pulse.source_timeout_secs == 0 {
            bail!("pulse.source_timeout_secs must be at least 1");
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Routes advertised by the health endpoint
    pub fn endpoints(&self) -> Vec<String> {
        vec![
            "/health".to_string(),
            self.server.mcp_path.clone(),
            "/connect".to_string(),
        ]
    }
}

/// Application state shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    pub auth: AuthGate,
    pub mcp: McpServer,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let mut registry = ToolRegistry::new(config.pulse.clone());
        registry.register(Arc::new(SlackAdapter::new(config.slack.clone())));
        registry.register(Arc::new(GithubAdapter::new(config.github.clone())));

        tracing::info!(adapters = ?registry.adapter_names(), "Registered provider adapters");

        let auth = AuthGate::new(config.auth.api_key.clone());
        if !auth.is_configured() {
            tracing::warn!("MCP_API_KEY is not set; every MCP connection will be refused");
        }

        Self {
            auth,
            mcp: McpServer::new(Arc::new(registry)),
            config,
        }
    }
}
