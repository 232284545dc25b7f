//! Typed errors for MCP operations

use thiserror::Error;

/// Failures talking to the remote MCP server
#[derive(Debug, Error)]
pub enum McpError {
    /// Non-success HTTP status from the server
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection refused, DNS failure, TLS failure and the like
    #[error("Network error: {0}")]
    Network(String),

    /// The session operation exceeded the configured ceiling
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// JSON-RPC error object returned by the server
    #[error("MCP error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Response did not have the expected shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON encoding or decoding failed
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation attempted on a connection that was already closed
    #[error("Connection already closed")]
    Closed,
}

impl McpError {
    /// Convert network/connection errors into typed McpError
    pub fn from_reqwest(e: reqwest::Error, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            McpError::Timeout(timeout_secs)
        } else if e.is_decode() {
            McpError::Protocol(format!("Failed to decode response: {}", e))
        } else if let Some(status) = e.status() {
            McpError::Http {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            McpError::Network(e.to_string())
        }
    }

    /// Failures that are expected while tearing a session down.
    ///
    /// Servers that do not support explicit session termination answer the
    /// close request with 404/405, and a second close sees `Closed`.
    pub fn is_benign_on_close(&self) -> bool {
        matches!(
            self,
            McpError::Closed | McpError::Http { status: 404 | 405, .. }
        )
    }
}
