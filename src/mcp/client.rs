//! Streamable-HTTP MCP client for the remote capability proxy.
//!
//! Every JSON-RPC message is a POST to the single endpoint. The server may
//! answer with `application/json` or with an SSE stream whose `data:` frames
//! carry JSON-RPC messages; both are accepted. The `Mcp-Session-Id` returned
//! by `initialize` is echoed on every later request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tokio::sync::RwLock;
use url::Url;

use super::types::*;

/// MCP protocol version we announce
const MCP_PROTOCOL_VERSION: &str = "2025-03-26";
const SESSION_HEADER: &str = "mcp-session-id";

/// Connected MCP client.
pub struct McpClient {
    endpoint: Url,
    client: reqwest::Client,
    session_id: RwLock<Option<String>>,
    request_id: AtomicU64,
    server_info: Option<ServerInfo>,
}

impl McpClient {
    /// Connect to an MCP server: `initialize` followed by the
    /// `notifications/initialized` notification.
    pub async fn connect(endpoint: Url) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        let mut mcp = Self {
            endpoint,
            client,
            session_id: RwLock::new(None),
            request_id: AtomicU64::new(1),
            server_info: None,
        };

        let params = InitializeParams {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: serde_json::json!({}),
            client_info: ClientInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        let result = mcp
            .send_jsonrpc("initialize", Some(serde_json::to_value(params)?))
            .await?;
        let init: InitializeResult = serde_json::from_value(result)?;

        tracing::info!(
            "Connected to MCP server {} (protocol {}, server {})",
            redact_url(&mcp.endpoint),
            init.protocol_version,
            init.server_info
                .as_ref()
                .map(|s| format!("{} {}", s.name, s.version.as_deref().unwrap_or("")))
                .unwrap_or_else(|| "unknown".to_string())
        );
        mcp.server_info = init.server_info;

        // Some servers require this before accepting tool calls.
        if let Err(e) = mcp.notify("notifications/initialized").await {
            tracing::debug!("initialized notification failed: {}", e);
        }

        Ok(mcp)
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn post(&self, body: &JsonRpcRequest) -> anyhow::Result<reqwest::Response> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .json(body);
        if let Some(session_id) = self.session_id.read().await.as_deref() {
            request = request.header(SESSION_HEADER, session_id);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {}: {}", status, text);
        }

        if let Some(session_id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.write().await = Some(session_id.to_string());
        }

        Ok(response)
    }

    async fn notify(&self, method: &str) -> anyhow::Result<()> {
        self.post(&JsonRpcRequest::notification(method)).await?;
        Ok(())
    }

    /// Send a JSON-RPC request and return its `result`.
    async fn send_jsonrpc(&self, method: &str, params: Option<Value>) -> anyhow::Result<Value> {
        let id = self.next_request_id();
        let response = self.post(&JsonRpcRequest::new(id, method, params)).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await?;

        let rpc = parse_response_body(&content_type, &body, id)?;
        if let Some(error) = rpc.error {
            anyhow::bail!("JSON-RPC error {}: {}", error.code, error.message);
        }
        rpc.result
            .ok_or_else(|| anyhow::anyhow!("No result in response to {}", method))
    }

    /// Discover the tools the server exposes.
    pub async fn list_tools(&self) -> anyhow::Result<Vec<McpToolDescriptor>> {
        let result = self.send_jsonrpc("tools/list", None).await?;
        let response: McpToolsResponse = serde_json::from_value(result)?;
        Ok(response.tools)
    }

    /// Call a tool and return its text content.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> anyhow::Result<String> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });
        let result = self.send_jsonrpc("tools/call", Some(params)).await?;
        let response: McpCallToolResponse = serde_json::from_value(result)?;

        if response.is_error {
            anyhow::bail!("Tool error: {}", response.text());
        }
        Ok(response.text())
    }
}

/// Extract the JSON-RPC response with the given id from a response body.
pub fn parse_response_body(
    content_type: &str,
    body: &str,
    id: u64,
) -> anyhow::Result<JsonRpcResponse> {
    if !content_type.starts_with("text/event-stream") {
        return Ok(serde_json::from_str(body)?);
    }

    // Events are separated by blank lines; multi-line data is joined with '\n'.
    let mut data = String::new();
    let mut events = Vec::new();
    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            if !data.is_empty() {
                events.push(std::mem::take(&mut data));
            }
        } else if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if !data.is_empty() {
        events.push(data);
    }

    events
        .iter()
        .filter_map(|event| serde_json::from_str::<JsonRpcResponse>(event).ok())
        .find(|rpc| rpc.id.as_ref().and_then(Value::as_u64) == Some(id))
        .ok_or_else(|| anyhow::anyhow!("No JSON-RPC response with id {} in event stream", id))
}

/// URL with query parameters (which carry the API key) removed, for logging.
pub fn redact_url(url: &Url) -> String {
    let mut redacted = url.clone();
    redacted.set_query(None);
    redacted.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::{routing::post, Json, Router};
    use serde_json::json;

    #[test]
    fn test_parse_plain_json_body() {
        let body = r#"{"jsonrpc":"2.0","id":3,"result":{"tools":[]}}"#;
        let rpc = parse_response_body("application/json", body, 3).unwrap();
        assert_eq!(rpc.result, Some(json!({"tools": []})));
    }

    #[test]
    fn test_parse_event_stream_body() {
        let body = concat!(
            "event: message\r\n",
            "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\r\n",
            "\r\n",
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"id\":7,\n",
            "data: \"result\":{\"ok\":true}}\n",
            "\n"
        );
        let rpc = parse_response_body("text/event-stream; charset=utf-8", body, 7).unwrap();
        assert_eq!(rpc.result, Some(json!({"ok": true})));
        assert!(parse_response_body("text/event-stream", body, 8).is_err());
    }

    #[test]
    fn test_redact_url_drops_api_key() {
        let url = Url::parse("https://server.smithery.ai/neon/mcp?api_key=secret&profile=p").unwrap();
        assert_eq!(redact_url(&url), "https://server.smithery.ai/neon/mcp");
    }

    /// Minimal streamable-HTTP MCP server: JSON for initialize, SSE for the rest.
    async fn mock_mcp(headers: HeaderMap, Json(req): Json<Value>) -> axum::response::Response {
        use axum::response::IntoResponse;

        let method = req["method"].as_str().unwrap_or_default().to_string();
        let id = req.get("id").cloned();
        let has_session = headers.get(SESSION_HEADER).is_some();

        match method.as_str() {
            "initialize" => (
                [(SESSION_HEADER, "session-1")],
                Json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {
                        "protocolVersion": MCP_PROTOCOL_VERSION,
                        "capabilities": {"tools": {}},
                        "serverInfo": {"name": "mock-neon", "version": "0.1.0"}
                    }
                })),
            )
                .into_response(),
            "notifications/initialized" => axum::http::StatusCode::ACCEPTED.into_response(),
            _ if !has_session => axum::http::StatusCode::BAD_REQUEST.into_response(),
            "tools/list" => {
                let payload = json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {"tools": [{
                        "name": "web_search",
                        "description": "Search the web",
                        "inputSchema": {"type": "object", "properties": {"query": {"type": "string"}}}
                    }]}
                });
                (
                    [(CONTENT_TYPE, "text/event-stream")],
                    format!("event: message\ndata: {}\n\n", payload),
                )
                    .into_response()
            }
            "tools/call" => {
                let query = req["params"]["arguments"]["query"].as_str().unwrap_or("");
                let is_error = query.is_empty();
                Json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {
                        "content": [{"type": "text", "text": format!("results for {}", query)}],
                        "isError": is_error
                    }
                }))
                .into_response()
            }
            _ => axum::http::StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn spawn_mock() -> Url {
        let app = Router::new().route("/mcp", post(mock_mcp));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("http://{}/mcp?api_key=k&profile=p", addr)).unwrap()
    }

    #[tokio::test]
    async fn test_connect_list_and_call() {
        let url = spawn_mock().await;
        let client = McpClient::connect(url).await.unwrap();
        assert_eq!(client.server_info().unwrap().name, "mock-neon");

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "web_search");

        let output = client
            .call_tool("web_search", json!({"query": "rain"}))
            .await
            .unwrap();
        assert_eq!(output, "results for rain");

        let err = client
            .call_tool("web_search", json!({"query": ""}))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Tool error"));
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let url = Url::parse("http://127.0.0.1:1/mcp").unwrap();
        assert!(McpClient::connect(url).await.is_err());
    }
}
