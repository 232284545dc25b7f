//! Streamable HTTP transport for remote MCP servers.
//!
//! Every JSON-RPC message is POSTed to a single endpoint. The server answers
//! either with a plain JSON body or with a short `text/event-stream` whose
//! `data:` lines carry the JSON-RPC response. A session id handed out in the
//! `Mcp-Session-Id` header is echoed on every later request, and closing the
//! transport sends a `DELETE` for that session.

use super::error::McpError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const SESSION_HEADER: &str = "mcp-session-id";

/// JSON-RPC request
#[derive(Debug, Clone, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// JSON-RPC notification (no id, no response)
#[derive(Debug, Clone, Serialize)]
struct JsonRpcNotification<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// JSON-RPC response
#[derive(Debug, Clone, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error
#[derive(Debug, Clone, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// HTTP transport for one MCP server session
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
    timeout_secs: u64,
    /// Request ID counter
    next_id: AtomicU64,
    session_id: Mutex<Option<String>>,
    closed: AtomicBool,
}

impl HttpTransport {
    /// Build a transport; no network traffic happens until the first request.
    pub fn new(
        url: &str,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, McpError> {
        url::Url::parse(url)
            .map_err(|e| McpError::Protocol(format!("Invalid MCP URL '{}': {}", url, e)))?;

        let mut header_map = HeaderMap::new();
        for (key, value) in headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| McpError::Protocol(format!("Invalid header name '{}': {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| McpError::Protocol(format!("Invalid value for header '{}': {}", key, e)))?;
            header_map.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| McpError::Network(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            headers: header_map,
            timeout_secs: timeout.as_secs(),
            next_id: AtomicU64::new(1),
            session_id: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Session id assigned by the server, if any
    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().ok().and_then(|s| s.clone())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send a request and wait for its response
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        if self.is_closed() {
            return Err(McpError::Closed);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let body = serde_json::to_string(&request)?;
        tracing::debug!("MCP request: {}", body);

        let response = self.post(body).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        let text = response
            .text()
            .await
            .map_err(|e| McpError::from_reqwest(e, self.timeout_secs))?;
        tracing::debug!("MCP response ({}): {}", content_type, text.trim());

        let response = if content_type.starts_with("text/event-stream") {
            parse_event_stream(&text, id)?
        } else {
            serde_json::from_str::<JsonRpcResponse>(&text)?
        };

        if let Some(error) = response.error {
            return Err(McpError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        response
            .result
            .ok_or_else(|| McpError::Protocol("MCP response missing result".to_string()))
    }

    /// Send a notification (no response expected)
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        if self.is_closed() {
            return Err(McpError::Closed);
        }
        let notification = JsonRpcNotification {
            jsonrpc: "2.0",
            method,
            params,
        };
        let body = serde_json::to_string(&notification)?;
        tracing::debug!("MCP notification: {}", body);
        self.post(body).await?;
        Ok(())
    }

    /// Terminate the server-side session.
    ///
    /// The transport is unusable afterwards. Closing twice returns `Closed`.
    pub async fn close(&self) -> Result<(), McpError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(McpError::Closed);
        }
        let Some(session_id) = self.session_id() else {
            return Ok(());
        };

        let response = self
            .client
            .delete(&self.url)
            .headers(self.headers.clone())
            .header(SESSION_HEADER, session_id)
            .send()
            .await
            .map_err(|e| McpError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(McpError::Http {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    async fn post(&self, body: String) -> Result<reqwest::Response, McpError> {
        let mut builder = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .header(ACCEPT, "application/json, text/event-stream")
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(session_id) = self.session_id() {
            builder = builder.header(SESSION_HEADER, session_id);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| McpError::from_reqwest(e, self.timeout_secs))?;

        if let Some(session_id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if let Ok(mut slot) = self.session_id.lock() {
                if slot.as_deref() != Some(session_id) {
                    tracing::debug!("MCP session id: {}", session_id);
                    *slot = Some(session_id.to_string());
                }
            }
        }

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(McpError::Http {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

/// Pick the response for `id` out of an SSE body.
fn parse_event_stream(body: &str, id: u64) -> Result<JsonRpcResponse, McpError> {
    let mut events = Vec::new();
    let mut data = String::new();
    for line in body.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        } else if line.trim().is_empty() && !data.is_empty() {
            events.push(std::mem::take(&mut data));
        }
    }
    if !data.is_empty() {
        events.push(data);
    }

    for event in events {
        // Server-initiated notifications may share the stream
        let Ok(message) = serde_json::from_str::<JsonRpcResponse>(&event) else {
            tracing::debug!("Skipping non-JSON SSE event: {}", event);
            continue;
        };
        if message.id.as_ref().and_then(Value::as_u64) == Some(id) {
            return Ok(message);
        }
    }

    Err(McpError::Protocol(format!(
        "No response for request {} in event stream",
        id
    )))
}
