//! Connection lifecycle for the dbt MCP server
//!
//! Connecting opens a session through the `Connector`, fetches the tool
//! catalog, deduplicates it and builds the agent, then installs all three on
//! the `Session` at once. Disconnecting detaches them first and then closes
//! the remote session, so local state is reset even when the close fails.

use crate::agent::Agent;
use crate::bridge::settle_teardown;
use crate::config::MissingCredentials;
use crate::mcp::{dedup_tools, Connector, ConnectionStatus, McpError, McpServerParams, McpToolDef, ToolService};
use crate::session::{ActiveConnection, Session};
use std::sync::Arc;
use thiserror::Error;

/// Why a connect attempt failed
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Credentials missing; nothing was sent over the network
    #[error(transparent)]
    Configuration(#[from] MissingCredentials),

    /// Opening the session or listing tools failed
    #[error(transparent)]
    Connection(#[from] McpError),
}

impl ConnectError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, ConnectError::Configuration(_))
    }
}

/// Opens and closes the session's MCP connection
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Connect the session, replacing any existing connection.
    ///
    /// Returns the number of tools in the deduplicated catalog. On failure the
    /// session is left disconnected with an empty catalog and no agent.
    pub fn connect(&self, session: &mut Session) -> Result<usize, ConnectError> {
        // Never keep two remote sessions open
        self.disconnect(session);

        let params = session.credentials.server_params(&session.config().mcp)?;
        session.set_status(ConnectionStatus::Connecting);
        tracing::info!("Connecting to MCP server '{}' at {}", params.name, params.url);

        let opened = session.runtime().run(open(self.connector.as_ref(), &params));
        match opened {
            Ok((service, tools)) => {
                let agent_config = &session.config().agent;
                let agent = Agent::new(
                    agent_config.name.clone(),
                    agent_config.effective_instructions(),
                    session.model.model.clone(),
                )
                .with_catalog(&tools);

                let count = tools.len();
                tracing::info!("Connected to '{}' with {} tools", params.name, count);
                session.install_connection(ActiveConnection { service, tools, agent });
                Ok(count)
            }
            Err(e) => {
                tracing::warn!("Failed to connect to '{}': {}", params.name, e);
                session.set_status(ConnectionStatus::Disconnected);
                session.record_error(error_chain(&e));
                Err(ConnectError::Connection(e))
            }
        }
    }

    /// Close the current connection, if any. Safe to call repeatedly.
    pub fn disconnect(&self, session: &mut Session) {
        let Some(active) = session.take_connection() else {
            return;
        };
        tracing::info!("Disconnecting from MCP server '{}'", active.service.name());
        let result = session.runtime().run(active.service.close());
        settle_teardown("MCP session close", result, McpError::is_benign_on_close);
    }

    /// Check the server is reachable with the current credentials, without
    /// touching the session's connection.
    pub fn check_connection(&self, session: &Session) -> Result<usize, ConnectError> {
        let params = session.credentials.server_params(&session.config().mcp)?;
        let (service, tools) = session.runtime().run(open(self.connector.as_ref(), &params))?;
        let result = session.runtime().run(service.close());
        settle_teardown("MCP session close", result, McpError::is_benign_on_close);
        Ok(tools.len())
    }
}

/// Open a session and fetch its deduplicated catalog.
///
/// A session whose catalog fetch fails is closed before the error is returned.
async fn open(
    connector: &dyn Connector,
    params: &McpServerParams,
) -> Result<(Arc<dyn ToolService>, Vec<McpToolDef>), McpError> {
    let service = connector.connect(params).await?;
    let listed = match tokio::time::timeout(params.timeout, service.list_tools()).await {
        Ok(listed) => listed,
        Err(_) => Err(McpError::Timeout(params.timeout.as_secs())),
    };
    match listed {
        Ok(tools) => Ok((service, dedup_tools(tools))),
        Err(e) => {
            settle_teardown(
                "MCP session close after failed tool listing",
                service.close().await,
                McpError::is_benign_on_close,
            );
            Err(e)
        }
    }
}

/// Render an error with its sources, one per line
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str("\n  caused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] McpError);

    #[test]
    fn test_error_chain_lists_sources() {
        let chain = error_chain(&Outer(McpError::Closed));
        assert!(chain.starts_with("outer"));
        assert!(chain.contains("caused by: "));
    }

    #[test]
    fn test_connect_error_is_transparent() {
        let err = ConnectError::from(MissingCredentials);
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Missing required dbt credentials"));
    }
}
