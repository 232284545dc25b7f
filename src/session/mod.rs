//! Per-user session state
//!
//! One `Session` lives for the whole interactive run. It owns the async
//! runtime, the user's settings, the chat history and, while connected, the
//! live MCP connection together with its tool catalog and agent. The three
//! connection-derived values only exist together, so "connected" always means
//! all of them are present.

mod chat;

pub use chat::{Chat, ChatError, ChatHistory, ChatMessage, DEFAULT_CHAT_NAME, HISTORY_LIMIT};

use crate::agent::Agent;
use crate::bridge::{settle_teardown, BridgeError, SessionRuntime};
use crate::config::{Config, DbtCredentials};
use crate::llm::find_provider;
use crate::mcp::{ConnectionStatus, McpError, McpToolDef, ToolService};
use std::sync::Arc;

/// A live MCP connection and everything derived from it
pub struct ActiveConnection {
    pub service: Arc<dyn ToolService>,
    /// Deduplicated tool catalog
    pub tools: Vec<McpToolDef>,
    /// Agent bound to `tools`
    pub agent: Agent,
}

impl std::fmt::Debug for ActiveConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveConnection")
            .field("server", &self.service.name())
            .field("tools", &self.tools.len())
            .field("agent", &self.agent.name)
            .finish()
    }
}

/// Model selection and credentials for the language model
#[derive(Clone, Default, PartialEq)]
pub struct ModelParams {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ModelParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelParams")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ModelParams {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Switch provider; unknown providers are rejected
    pub fn set_provider(&mut self, provider: &str) -> Option<&str> {
        let (name, model) = find_provider(provider)?;
        self.provider = name.to_string();
        self.model = model.to_string();
        Some(&self.model)
    }
}

pub struct Session {
    runtime: SessionRuntime,
    config: Config,
    pub credentials: DbtCredentials,
    pub model: ModelParams,
    pub chats: ChatHistory,
    connection: Option<ActiveConnection>,
    status: ConnectionStatus,
    /// Full error chain of the most recent failure, for `/trace`
    last_error: Option<String>,
}

impl Session {
    pub fn new(config: Config, credentials: DbtCredentials, api_key: Option<String>) -> Result<Self, BridgeError> {
        let model = ModelParams {
            provider: config.llm.provider.clone(),
            model: config.llm.model.clone(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        };
        Ok(Self {
            runtime: SessionRuntime::new()?,
            config,
            credentials,
            model,
            chats: ChatHistory::new(),
            connection: None,
            status: ConnectionStatus::Disconnected,
            last_error: None,
        })
    }

    pub fn runtime(&self) -> &SessionRuntime {
        &self.runtime
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Connected and holding an API key
    pub fn is_ready(&self) -> bool {
        self.is_connected() && self.model.has_api_key()
    }

    pub fn connection(&self) -> Option<&ActiveConnection> {
        self.connection.as_ref()
    }

    /// Tool catalog; empty while disconnected
    pub fn tools(&self) -> &[McpToolDef] {
        self.connection.as_ref().map(|c| c.tools.as_slice()).unwrap_or(&[])
    }

    pub fn agent(&self) -> Option<&Agent> {
        self.connection.as_ref().map(|c| &c.agent)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn record_error(&mut self, detail: impl Into<String>) {
        self.last_error = Some(detail.into());
    }

    pub(crate) fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
    }

    pub(crate) fn install_connection(&mut self, connection: ActiveConnection) {
        self.connection = Some(connection);
        self.status = ConnectionStatus::Connected;
    }

    /// Detach the live connection, leaving the session disconnected
    pub(crate) fn take_connection(&mut self) -> Option<ActiveConnection> {
        self.status = ConnectionStatus::Disconnected;
        self.connection.take()
    }

    /// Close any live connection and stop the runtime
    pub fn shutdown(mut self) {
        if let Some(active) = self.take_connection() {
            let result = self.runtime.run(active.service.close());
            settle_teardown("MCP session close", result, McpError::is_benign_on_close);
        }
        self.runtime.shutdown();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("status", &self.status)
            .field("connection", &self.connection)
            .field("credentials", &self.credentials)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(Config::default(), DbtCredentials::default(), None).unwrap()
    }

    #[test]
    fn test_new_session_is_disconnected() {
        let session = session();
        assert!(!session.is_connected());
        assert!(!session.is_ready());
        assert!(session.tools().is_empty());
        assert!(session.agent().is_none());
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert_eq!(session.model.model, "gpt-4o");
    }

    #[test]
    fn test_blank_api_key_is_unset() {
        let session = Session::new(Config::default(), DbtCredentials::default(), Some("  ".into())).unwrap();
        assert!(!session.model.has_api_key());
    }

    #[test]
    fn test_set_provider() {
        let mut params = ModelParams::default();
        assert_eq!(params.set_provider("openai"), Some("gpt-4o"));
        assert_eq!(params.provider, "OpenAI");
        assert_eq!(params.set_provider("nope"), None);
        assert_eq!(params.provider, "OpenAI");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let params = ModelParams {
            api_key: Some("sk-secret".into()),
            ..Default::default()
        };
        assert!(!format!("{:?}", params).contains("sk-secret"));
    }

    #[test]
    fn test_record_error() {
        let mut session = session();
        assert!(session.last_error().is_none());
        session.record_error("boom");
        assert_eq!(session.last_error(), Some("boom"));
    }

    #[test]
    fn test_shutdown_without_connection() {
        session().shutdown();
    }
}
