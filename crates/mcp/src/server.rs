// MCP server: per-session JSON-RPC handling, independent of the transport

use crate::dispatcher::dispatch;
use crate::protocol::*;
use crate::tools::{ToolCatalog, ToolContext, ToolRegistry};
use serde_json::Value;
use std::sync::Arc;

/// Gateway-wide MCP server holding the adapter registry
pub struct McpServer {
    registry: Arc<ToolRegistry>,
    info: ServerInfo,
}

impl McpServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            info: ServerInfo {
                name: "puzzlecats-mcp-gateway".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Compose a catalog for this caller and start a session around it
    pub fn open_session(&self, ctx: ToolContext) -> McpSession {
        let catalog = self.registry.compose(&ctx);
        McpSession {
            catalog: Arc::new(catalog),
            ctx,
            info: self.info.clone(),
        }
    }
}

/// What the transport should do with one inbound request
pub enum Routed {
    /// Write this response now
    Respond(JsonRpcResponse),
    /// Run a tool call; its response is produced by [`McpSession::call`]
    Call { id: Value, params: CallToolParams },
    /// Notification: nothing to send
    Ignore,
}

/// One client's view of the gateway. Cheap to clone into per-call tasks.
#[derive(Clone)]
pub struct McpSession {
    catalog: Arc<ToolCatalog>,
    ctx: ToolContext,
    info: ServerInfo,
}

impl McpSession {
    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    /// First frame of every session: the composed catalog
    pub fn catalog_notification(&self) -> JsonRpcRequest {
        JsonRpcRequest::notification(
            CATALOG_NOTIFICATION,
            ListToolsResult {
                tools: self.catalog.list_schemas(),
            },
        )
    }

    /// Parse one text frame. Malformed frames yield the error response to send back.
    pub fn parse_frame(text: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
        let value: Value = serde_json::from_str(text)
            .map_err(|_| JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error()))?;

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|_| JsonRpcResponse::error(id, JsonRpcError::invalid_request()))
    }

    /// Decide how to answer a request without running any tool
    pub fn route(&self, request: JsonRpcRequest) -> Routed {
        let is_notification = request.is_notification();
        let id = request.id.clone().unwrap_or(Value::Null);

        if request.id == Some(Value::Null) {
            tracing::debug!(method = %request.method, "Rejecting request with a null id");
            return Routed::Respond(JsonRpcResponse::error(Value::Null, JsonRpcError::invalid_request()));
        }

        if request.jsonrpc != "2.0" {
            return if is_notification {
                Routed::Ignore
            } else {
                Routed::Respond(JsonRpcResponse::error(id, JsonRpcError::invalid_request()))
            };
        }

        match request.method.as_str() {
            "initialize" => {
                let params: InitializeParams = request
                    .params
                    .and_then(|p| serde_json::from_value(p).ok())
                    .unwrap_or_default();
                if let Some(client) = &params.client_info {
                    tracing::info!(client = %client.name, version = %client.version, "MCP client initializing");
                }

                let result = InitializeResult {
                    protocol_version: PROTOCOL_VERSION.to_string(),
                    capabilities: ServerCapabilities {
                        tools: Some(ToolsCapability { list_changed: false }),
                    },
                    server_info: self.info.clone(),
                };
                Routed::Respond(JsonRpcResponse::success(id, result))
            }

            "notifications/initialized" => {
                tracing::debug!(identity = %self.ctx.identity, "MCP client initialized");
                Routed::Ignore
            }

            "ping" => Routed::Respond(JsonRpcResponse::success(id, serde_json::json!({}))),

            "tools/list" => Routed::Respond(JsonRpcResponse::success(
                id,
                ListToolsResult {
                    tools: self.catalog.list_schemas(),
                },
            )),

            "tools/call" => {
                if is_notification {
                    tracing::warn!("Ignoring tools/call sent as a notification");
                    return Routed::Ignore;
                }
                match request.params.map(serde_json::from_value::<CallToolParams>) {
                    Some(Ok(params)) => Routed::Call { id, params },
                    Some(Err(e)) => Routed::Respond(JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_params(format!("Invalid tools/call params: {}", e)),
                    )),
                    None => Routed::Respond(JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_params("Missing tools/call params"),
                    )),
                }
            }

            method => {
                if is_notification {
                    tracing::debug!(method, "Ignoring unknown notification");
                    Routed::Ignore
                } else {
                    tracing::warn!(method, "MCP unknown method");
                    Routed::Respond(JsonRpcResponse::error(id, JsonRpcError::method_not_found(method)))
                }
            }
        }
    }

    /// Run one tool call and wrap its result for the wire
    pub async fn call(&self, id: Value, params: CallToolParams) -> JsonRpcResponse {
        tracing::info!(tool = %params.name, identity = %self.ctx.identity, "MCP tools/call");
        let result = dispatch(&self.catalog, params, &self.ctx).await;
        JsonRpcResponse::success(id, result)
    }

    /// Route and, for tool calls, execute inline
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        match self.route(request) {
            Routed::Respond(response) => Some(response),
            Routed::Call { id, params } => Some(self.call(id, params).await),
            Routed::Ignore => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{GithubAdapter, GithubConfig, SlackAdapter, SlackConfig};
    use serde_json::json;

    fn make_session() -> McpSession {
        let mut registry = ToolRegistry::default();
        registry.register(Arc::new(SlackAdapter::new(SlackConfig::default())));
        registry.register(Arc::new(GithubAdapter::new(GithubConfig::default())));
        McpServer::new(Arc::new(registry)).open_session(ToolContext::new("a@b.com"))
    }

    fn request(id: i64, method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest::new(id, method, params)
    }

    #[tokio::test]
    async fn test_handle_initialize() {
        let session = make_session();
        let resp = session
            .handle_request(request(1, "initialize", json!({"clientInfo": {"name": "test", "version": "1"}})))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "puzzlecats-mcp-gateway");
    }

    #[test]
    fn test_catalog_notification_lists_all_tools() {
        let session = make_session();
        let note = session.catalog_notification();
        assert_eq!(note.method, CATALOG_NOTIFICATION);

        let names: Vec<String> = note.params.unwrap()["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["slack_search", "github_search_issues", "pulse_merge_clash"]);
    }

    #[tokio::test]
    async fn test_handle_tools_list() {
        let session = make_session();
        let resp = session.handle_request(request(2, "tools/list", json!({}))).await.unwrap();
        let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 3);
        assert_eq!(tools[0]["inputSchema"]["type"], "object");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_a_result_not_a_fault() {
        let session = make_session();
        let resp = session
            .handle_request(request(3, "tools/call", json!({"name": "nope", "arguments": {}})))
            .await
            .unwrap();

        assert!(resp.error.is_none());
        assert_eq!(resp.id, json!(3));
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(result["content"][0]["text"], "Unknown tool: nope");
    }

    #[tokio::test]
    async fn test_unconfigured_provider_names_variable() {
        let session = make_session();
        let resp = session
            .handle_request(request(4, "tools/call", json!({"name": "slack_search", "arguments": {"query": "x"}})))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(result["content"][0]["text"], "Slack is not configured: set SLACK_XOXP_TOKEN");
    }

    #[tokio::test]
    async fn test_tools_call_without_params() {
        let session = make_session();
        let req = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(5)),
            method: "tools/call".to_string(),
            params: None,
        };
        let resp = session.handle_request(req).await.unwrap();
        assert_eq!(resp.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_unknown_method_and_notifications() {
        let session = make_session();

        let resp = session.handle_request(request(6, "resources/list", json!({}))).await.unwrap();
        assert_eq!(resp.error.unwrap().code, -32601);

        let note = JsonRpcRequest::notification("notifications/initialized", json!({}));
        assert!(session.handle_request(note).await.is_none());

        let unknown_note = JsonRpcRequest::notification("notifications/whatever", json!({}));
        assert!(session.handle_request(unknown_note).await.is_none());
    }

    #[tokio::test]
    async fn test_ping() {
        let session = make_session();
        let resp = session.handle_request(request(7, "ping", json!({}))).await.unwrap();
        assert_eq!(resp.result.unwrap(), json!({}));
    }

    #[test]
    fn test_parse_frame() {
        let err = McpSession::parse_frame("{not json").unwrap_err();
        assert_eq!(err.error.unwrap().code, -32700);
        assert_eq!(err.id, Value::Null);

        let err = McpSession::parse_frame(r#"{"jsonrpc":"2.0","id":9}"#).unwrap_err();
        assert_eq!(err.error.unwrap().code, -32600);
        assert_eq!(err.id, json!(9));

        let ok = McpSession::parse_frame(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).unwrap();
        assert_eq!(ok.method, "ping");
    }

    #[test]
    fn test_wrong_jsonrpc_version() {
        let session = make_session();
        let req = JsonRpcRequest {
            jsonrpc: "1.0".to_string(),
            id: Some(json!(8)),
            method: "ping".to_string(),
            params: None,
        };
        match session.route(req) {
            Routed::Respond(resp) => assert_eq!(resp.error.unwrap().code, -32600),
            _ => panic!("expected an error response"),
        }
    }

    #[test]
    fn test_null_id_gets_invalid_request() {
        let session = make_session();
        let req = McpSession::parse_frame(
            r#"{"jsonrpc":"2.0","id":null,"method":"tools/call","params":{"name":"slack_search","arguments":{"query":"x"}}}"#,
        )
        .unwrap();
        match session.route(req) {
            Routed::Respond(resp) => {
                assert_eq!(resp.id, Value::Null);
                assert_eq!(resp.error.unwrap().code, -32600);
            }
            _ => panic!("expected an error response"),
        }
    }

    #[test]
    fn test_sessions_do_not_share_context() {
        let registry = Arc::new(ToolRegistry::default());
        let server = McpServer::new(registry);
        let a = server.open_session(ToolContext::new("a@b.com"));
        let b = server.open_session(ToolContext::new("c@d.com"));
        assert_ne!(a.context(), b.context());
        assert_eq!(a.catalog().names(), b.catalog().names());
    }
}
