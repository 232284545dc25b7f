//! Configuration management for dbt-chat
//!
//! Two sources: an optional `config.toml` in the platform config directory
//! (model, timeouts, agent settings) and environment variables for the dbt
//! Cloud credentials, which never live in the config file.

use crate::mcp::McpServerParams;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default dbt Cloud host
pub const DEFAULT_DBT_HOST: &str = "cloud.getdbt.com";

pub const ENV_DBT_HOST: &str = "DBT_HOST";
pub const ENV_DBT_MCP_URL: &str = "DBT_MCP_URL";
pub const ENV_DBT_TOKEN: &str = "DBT_TOKEN";
pub const ENV_DBT_PROD_ENV_ID: &str = "DBT_PROD_ENV_ID";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub mcp: McpConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider display name, see `llm::MODEL_OPTIONS`
    pub provider: String,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "OpenAI".to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 4096,
            temperature: 1.0,
            base_url: crate::llm::OPENAI_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct McpConfig {
    /// Logical name of the remote server
    pub server_name: String,
    /// Ceiling for remote session operations
    pub timeout_secs: u64,
    /// Restrict the catalog to these tools; all tools when unset
    pub allowed_tools: Option<Vec<String>>,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            server_name: "dbt".to_string(),
            timeout_secs: 20,
            allowed_tools: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub instructions: String,
    /// Append the dbt-focused system prompt to the instructions
    pub dbt_prompt: bool,
    pub max_turns: usize,
    pub tool_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: crate::agent::DEFAULT_AGENT_NAME.to_string(),
            instructions: crate::agent::DEFAULT_INSTRUCTIONS.to_string(),
            dbt_prompt: false,
            max_turns: 10,
            tool_timeout_secs: 30,
        }
    }
}

impl AgentConfig {
    /// Instructions handed to the agent
    pub fn effective_instructions(&self) -> String {
        if self.dbt_prompt {
            format!("{}\n\n{}", self.instructions, crate::prompts::system_prompt())
        } else {
            self.instructions.clone()
        }
    }
}

impl Config {
    /// Load configuration from default location or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "dbt-chat") {
            let config_dir = proj_dirs.config_dir();
            std::fs::create_dir_all(config_dir)?;
            Ok(config_dir.join("config.toml"))
        } else {
            Ok(PathBuf::from("config.toml"))
        }
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Connecting without both dbt credentials
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Missing required dbt credentials. Please provide DBT_TOKEN and DBT_PROD_ENV_ID.")]
pub struct MissingCredentials;

/// dbt Cloud connection settings, editable during a session
#[derive(Clone, PartialEq, Eq, Default)]
pub struct DbtCredentials {
    /// dbt Cloud hostname, without protocol
    pub host: String,
    /// Explicit MCP endpoint; derived from `host` when unset
    pub mcp_url: Option<String>,
    pub token: Option<String>,
    pub prod_env_id: Option<String>,
}

impl std::fmt::Debug for DbtCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbtCredentials")
            .field("host", &self.host)
            .field("mcp_url", &self.mcp_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("prod_env_id", &self.prod_env_id)
            .finish()
    }
}

impl DbtCredentials {
    /// Read from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary lookup; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            host: get(ENV_DBT_HOST)
                .map(|h| normalize_host(&h))
                .unwrap_or_else(|| DEFAULT_DBT_HOST.to_string()),
            mcp_url: get(ENV_DBT_MCP_URL),
            token: get(ENV_DBT_TOKEN),
            prod_env_id: get(ENV_DBT_PROD_ENV_ID),
        }
    }

    /// Change the host; an explicit URL is dropped so the endpoint follows the host
    pub fn set_host(&mut self, host: &str) {
        self.host = normalize_host(host);
        self.mcp_url = None;
    }

    /// Both credentials present
    pub fn is_complete(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
            && self.prod_env_id.as_deref().is_some_and(|e| !e.trim().is_empty())
    }

    /// MCP endpoint URL
    pub fn mcp_url(&self) -> String {
        match &self.mcp_url {
            Some(url) => url.clone(),
            None => format!("https://{}/api/ai/v1/mcp/", self.host),
        }
    }

    /// Connection parameters for the dbt MCP server
    pub fn server_params(&self, mcp: &McpConfig) -> Result<McpServerParams, MissingCredentials> {
        let (Some(token), Some(env_id)) = (
            self.token.as_deref().filter(|t| !t.trim().is_empty()),
            self.prod_env_id.as_deref().filter(|e| !e.trim().is_empty()),
        ) else {
            return Err(MissingCredentials);
        };

        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), format!("token {}", token));
        headers.insert("x-dbt-prod-environment-id".to_string(), env_id.to_string());

        Ok(McpServerParams {
            name: mcp.server_name.clone(),
            url: self.mcp_url(),
            headers,
            timeout: Duration::from_secs(mcp.timeout_secs),
            allowed_tools: mcp.allowed_tools.clone(),
        })
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let host = host
        .strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"))
        .unwrap_or(host);
    host.trim_end_matches('/').to_string()
}
