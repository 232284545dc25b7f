//! MCP client for the remote dbt MCP server (async).

use super::error::McpError;
use super::transport::HttpTransport;
use super::types::{McpToolDef, McpToolResult, ServerCapabilities};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Protocol revision sent during the handshake
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Connection parameters for one remote MCP server
#[derive(Debug, Clone, PartialEq)]
pub struct McpServerParams {
    /// Logical server name (e.g. "dbt")
    pub name: String,
    /// Streamable HTTP endpoint
    pub url: String,
    /// Extra headers sent with every request (auth lives here)
    pub headers: HashMap<String, String>,
    /// Ceiling for each remote session operation
    pub timeout: Duration,
    /// When set, only these tools are exposed from the catalog
    pub allowed_tools: Option<Vec<String>>,
}

/// A live connection to a remote tool service
#[async_trait]
pub trait ToolService: Send + Sync {
    /// Logical server name
    fn name(&self) -> &str;

    /// Fetch the tool catalog
    async fn list_tools(&self) -> Result<Vec<McpToolDef>, McpError>;

    /// Invoke one tool
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult, McpError>;

    /// Release the connection
    async fn close(&self) -> Result<(), McpError>;
}

/// Opens connections to a remote tool service
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, params: &McpServerParams) -> Result<Arc<dyn ToolService>, McpError>;
}

/// Connector for streamable HTTP MCP servers
#[derive(Debug, Clone, Default)]
pub struct HttpConnector;

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, params: &McpServerParams) -> Result<Arc<dyn ToolService>, McpError> {
        let client = RemoteMcpClient::connect(params).await?;
        Ok(Arc::new(client))
    }
}

/// Client for a remote MCP server over streamable HTTP
pub struct RemoteMcpClient {
    name: String,
    transport: HttpTransport,
    capabilities: ServerCapabilities,
    allowed_tools: Option<Vec<String>>,
}

impl RemoteMcpClient {
    /// Open the transport and perform the initialize handshake
    pub async fn connect(params: &McpServerParams) -> Result<Self, McpError> {
        let transport = HttpTransport::new(&params.url, &params.headers, params.timeout)?;

        let init_result = transport
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "dbt-chat",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                })),
            )
            .await?;

        if let Err(e) = transport.notify("notifications/initialized", None).await {
            tracing::warn!("initialized notification failed: {}", e);
        }

        let capabilities: ServerCapabilities = init_result
            .get("capabilities")
            .cloned()
            .and_then(|c| serde_json::from_value(c).ok())
            .unwrap_or_default();

        tracing::info!("Connected to MCP server '{}' at {}", params.name, params.url);

        Ok(Self {
            name: params.name.clone(),
            transport,
            capabilities,
            allowed_tools: params.allowed_tools.clone(),
        })
    }

    /// Capabilities advertised by the server
    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    /// Session id assigned by the server
    pub fn session_id(&self) -> Option<String> {
        self.transport.session_id()
    }

    fn is_allowed(&self, tool: &str) -> bool {
        match &self.allowed_tools {
            Some(allowed) => allowed.iter().any(|name| name == tool),
            None => true,
        }
    }
}

#[async_trait]
impl ToolService for RemoteMcpClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<McpToolDef>, McpError> {
        let mut tools: Vec<McpToolDef> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen: HashSet<String> = HashSet::new();

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self.transport.request("tools/list", params).await?;

            let page: Vec<McpToolDef> = result
                .get("tools")
                .cloned()
                .map(serde_json::from_value)
                .transpose()?
                .ok_or_else(|| McpError::Protocol("tools/list result missing 'tools'".into()))?;
            tools.extend(page);

            cursor = result
                .get("nextCursor")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(String::from);
            match &cursor {
                None => break,
                Some(c) if !seen.insert(c.clone()) => {
                    return Err(McpError::Protocol(format!(
                        "tools/list repeated cursor '{}'",
                        c
                    )));
                }
                Some(_) => {}
            }
        }

        tools.retain(|t| self.is_allowed(&t.name));
        tracing::debug!("MCP server '{}' exposes {} tools", self.name, tools.len());
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult, McpError> {
        if !self.is_allowed(name) {
            return Err(McpError::Protocol(format!("Tool '{}' is not allowed", name)));
        }
        let result = self
            .transport
            .request(
                "tools/call",
                Some(json!({
                    "name": name,
                    "arguments": arguments
                })),
            )
            .await?;

        Ok(serde_json::from_value(result)?)
    }

    async fn close(&self) -> Result<(), McpError> {
        self.transport.close().await?;
        tracing::info!("Closed MCP server '{}'", self.name);
        Ok(())
    }
}
