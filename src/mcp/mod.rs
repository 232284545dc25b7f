//! MCP (Model Context Protocol) client implementation.
//!
//! Connects to the remote dbt MCP server over streamable HTTP and exposes
//! its tools to the agent runtime.

pub mod client;
pub mod error;
pub mod transport;
pub mod types;

// Re-export main types
pub use client::{Connector, HttpConnector, McpServerParams, RemoteMcpClient, ToolService};
pub use error::McpError;
pub use transport::HttpTransport;
pub use types::{dedup_tools, ConnectionStatus, McpContent, McpToolDef, McpToolResult};
