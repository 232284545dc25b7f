//! Streamable HTTP MCP client against a mock server

use dbt_chat::config::{Config, DbtCredentials, ENV_DBT_MCP_URL, ENV_DBT_PROD_ENV_ID, ENV_DBT_TOKEN};
use dbt_chat::mcp::{HttpConnector, McpError, McpServerParams, RemoteMcpClient, ToolService};
use dbt_chat::services::ConnectionManager;
use dbt_chat::Session;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SESSION_ID: &str = "session-abc";

fn rpc_result(id: u64, result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/json")
        .insert_header("mcp-session-id", SESSION_ID)
        .set_body_json(json!({"jsonrpc": "2.0", "id": id, "result": result}))
}

fn params(server: &MockServer) -> McpServerParams {
    let mut headers = HashMap::new();
    headers.insert("Authorization".to_string(), "token dbtc_secret".to_string());
    headers.insert("x-dbt-prod-environment-id".to_string(), "12345".to_string());
    McpServerParams {
        name: "dbt".to_string(),
        url: format!("{}/api/ai/v1/mcp/", server.uri()),
        headers,
        timeout: Duration::from_secs(5),
        allowed_tools: None,
    }
}

/// Handshake mocks shared by every test
async fn mount_handshake(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/ai/v1/mcp/"))
        .and(header("authorization", "token dbtc_secret"))
        .and(header("x-dbt-prod-environment-id", "12345"))
        .and(body_partial_json(json!({"method": "initialize"})))
        .respond_with(rpc_result(
            1,
            json!({
                "protocolVersion": "2025-03-26",
                "capabilities": {"tools": {"listChanged": false}},
                "serverInfo": {"name": "dbt-mcp", "version": "1.0.0"}
            }),
        ))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "notifications/initialized"})))
        .respond_with(ResponseTemplate::new(202))
        .mount(server)
        .await;
}

async fn mount_catalog(server: &MockServer) {
    Mock::given(method("POST"))
        .and(header("mcp-session-id", SESSION_ID))
        .and(body_partial_json(json!({"method": "tools/list"})))
        .respond_with(rpc_result(
            2,
            json!({
                "tools": [
                    {"name": "list_metrics", "description": "List metrics",
                     "inputSchema": {"type": "object", "properties": {}}},
                    {"name": "query_metrics", "description": "Query metrics",
                     "inputSchema": {"type": "object",
                                     "properties": {"metrics": {"type": "array"}},
                                     "required": ["metrics"]}},
                    {"name": "list_metrics", "description": "duplicate"}
                ]
            }),
        ))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_connect_list_and_close() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;
    mount_catalog(&server).await;
    Mock::given(method("DELETE"))
        .and(header("mcp-session-id", SESSION_ID))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = RemoteMcpClient::connect(&params(&server)).await.unwrap();
    assert_eq!(client.session_id().as_deref(), Some(SESSION_ID));
    assert!(client.capabilities().tools.is_some());

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 3);
    assert_eq!(tools[1].parameters(), vec!["metrics: array (required)".to_string()]);

    client.close().await.unwrap();
    assert!(matches!(client.close().await, Err(McpError::Closed)));
}

#[tokio::test]
async fn test_catalog_follows_pagination_cursor() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "tools/list", "params": {"cursor": "page-2"}})))
        .respond_with(rpc_result(3, json!({"tools": [{"name": "get_dimensions"}]})))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "tools/list"})))
        .respond_with(rpc_result(
            2,
            json!({"tools": [{"name": "list_metrics"}], "nextCursor": "page-2"}),
        ))
        .mount(&server)
        .await;

    let client = RemoteMcpClient::connect(&params(&server)).await.unwrap();
    let names: Vec<String> = client
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["list_metrics", "get_dimensions"]);
}

#[tokio::test]
async fn test_repeated_cursor_stops_catalog_fetch() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "tools/list"})))
        .respond_with(rpc_result(
            2,
            json!({"tools": [{"name": "list_metrics"}], "nextCursor": "same"}),
        ))
        .expect(2)
        .mount(&server)
        .await;

    let client = RemoteMcpClient::connect(&params(&server)).await.unwrap();
    match client.list_tools().await {
        Err(McpError::Protocol(message)) => assert!(message.contains("repeated cursor")),
        other => panic!("expected protocol error, got {:?}", other.map(|t| t.len())),
    }
    server.verify().await;
}

#[tokio::test]
async fn test_event_stream_responses() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;
    let body = "event: message\n\
                data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/message\",\"params\":{}}\n\
                \n\
                event: message\n\
                data: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"revenue: 42\"}]}}\n\
                \n";
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "tools/call",
            "params": {"name": "query_metrics", "arguments": {"metrics": ["revenue"]}}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body, "text/event-stream"),
        )
        .mount(&server)
        .await;

    let client = RemoteMcpClient::connect(&params(&server)).await.unwrap();
    let result = client
        .call_tool("query_metrics", json!({"metrics": ["revenue"]}))
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.to_text(), "revenue: 42");
}

#[tokio::test]
async fn test_rpc_error_is_typed() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "tools/list"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 2,
            "error": {"code": -32601, "message": "Method not found"}
        })))
        .mount(&server)
        .await;

    let client = RemoteMcpClient::connect(&params(&server)).await.unwrap();
    match client.list_tools().await {
        Err(McpError::Rpc { code, message }) => {
            assert_eq!(code, -32601);
            assert_eq!(message, "Method not found");
        }
        other => panic!("expected RPC error, got {:?}", other.map(|t| t.len())),
    }
}

#[tokio::test]
async fn test_unauthorized_handshake() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .mount(&server)
        .await;

    match RemoteMcpClient::connect(&params(&server)).await {
        Err(McpError::Http { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "invalid token");
        }
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("handshake should fail"),
    }
}

#[tokio::test]
async fn test_allowed_tools_filter() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;
    mount_catalog(&server).await;

    let mut params = params(&server);
    params.allowed_tools = Some(vec!["query_metrics".to_string()]);
    let client = RemoteMcpClient::connect(&params).await.unwrap();

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "query_metrics");
    assert!(matches!(
        client.call_tool("list_metrics", json!({})).await,
        Err(McpError::Protocol(_))
    ));
}

#[test]
fn test_session_connects_over_http() {
    // The mock server gets its own runtime; the session blocks on its own
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(async {
        let server = MockServer::start().await;
        mount_handshake(&server).await;
        mount_catalog(&server).await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(405))
            .expect(1)
            .mount(&server)
            .await;
        server
    });

    let url = format!("{}/api/ai/v1/mcp/", server.uri());
    let credentials = DbtCredentials::from_lookup(|key| match key {
        ENV_DBT_TOKEN => Some("dbtc_secret".to_string()),
        ENV_DBT_PROD_ENV_ID => Some("12345".to_string()),
        ENV_DBT_MCP_URL => Some(url.clone()),
        _ => None,
    });
    let mut session = Session::new(Config::default(), credentials, None).unwrap();
    let manager = ConnectionManager::new(Arc::new(HttpConnector));

    let count = manager.connect(&mut session).unwrap();
    assert_eq!(count, 2);

    // 405 on close is expected from servers without session termination
    manager.disconnect(&mut session);
    assert!(!session.is_connected());

    session.shutdown();
    rt.block_on(server.verify());
}
