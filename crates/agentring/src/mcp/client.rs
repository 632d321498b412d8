use std::time::{Duration, Instant};

use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

use super::error::TransportError;
use crate::tools::ToolDescriptor;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for a tool-invocation server.
///
/// Each call is a self-contained request, so one client may serve any number
/// of concurrent callers. Nothing is retried: a failed call surfaces
/// immediately. The discovered tool list is fetched once and cached for the
/// lifetime of the client.
#[derive(Debug)]
pub struct McpClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    tools: OnceCell<Vec<ToolDescriptor>>,
}

/// Summary of a server gathered by [`McpClient::server_info`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub url: String,
    pub name: Option<String>,
    pub version: Option<String>,
    pub healthy: bool,
    pub tools: Vec<String>,
}

impl McpClient {
    pub fn new(server_url: &str) -> Result<Self, TransportError> {
        Ok(Self {
            http: HttpClient::new(),
            base_url: normalize_server_url(server_url)?,
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            tools: OnceCell::new(),
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = (!key.is_empty()).then_some(key);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn server_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `base_url` plus `segments`, each percent-encoded as a single path
    /// segment so a tool name cannot alter the route.
    fn endpoint(&self, segments: &[&str]) -> Result<String, TransportError> {
        let invalid = |message: &str| TransportError::InvalidUrl {
            url: self.base_url.clone(),
            message: message.to_string(),
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(&e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.into())
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Invoke `name` with `arguments` and return the decoded response body.
    ///
    /// The body is returned as-is, including `{"success": false}` envelopes;
    /// interpreting them is the caller's concern.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, TransportError> {
        let url = self.endpoint(&["mcp", "v1", "tools", name, "call"])?;
        let started = Instant::now();

        let request = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&json!({ "params": arguments }));
        let body = self.send_json(&url, request).await?;

        debug!(
            target: "agentring::mcp",
            tool = name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tool call completed"
        );
        Ok(body)
    }

    /// Tools advertised by the server, in server order. Fetched on first use.
    pub async fn discover_tools(&self) -> Result<&[ToolDescriptor], TransportError> {
        self.tools
            .get_or_try_init(|| self.fetch_tools())
            .await
            .map(Vec::as_slice)
    }

    async fn fetch_tools(&self) -> Result<Vec<ToolDescriptor>, TransportError> {
        let url = self.endpoint(&["mcp", "v1", "tools", "list"])?;
        let request = self.http.get(&url).timeout(self.timeout);
        let body = self.send_json(&url, request).await?;

        let Some(entries) = body.get("tools").and_then(Value::as_array) else {
            return Err(TransportError::malformed(&url, "missing 'tools' array"));
        };

        let tools: Vec<ToolDescriptor> = entries
            .iter()
            .filter_map(|entry| {
                match serde_json::from_value::<ToolDescriptor>(entry.clone()) {
                    Ok(tool) if !tool.name.is_empty() => {
                        Some(tool.with_server_url(self.base_url.clone()))
                    }
                    Ok(_) => {
                        warn!(target: "agentring::mcp", server = %self.base_url, "skipping tool with empty name");
                        None
                    }
                    Err(e) => {
                        warn!(target: "agentring::mcp", server = %self.base_url, error = %e, "skipping malformed tool entry");
                        None
                    }
                }
            })
            .collect();

        debug!(target: "agentring::mcp", server = %self.base_url, count = tools.len(), "discovered tools");
        Ok(tools)
    }

    /// `GET /health` expecting `{"status": "healthy"}`, falling back to
    /// `GET /info` expecting `{"success": true}`. Never fails.
    pub async fn health_check(&self) -> bool {
        if self.probe("health", "status", &json!("healthy")).await {
            return true;
        }
        self.probe("info", "success", &json!(true)).await
    }

    async fn probe(&self, path: &str, field: &str, expected: &Value) -> bool {
        let url = match self.endpoint(&[path]) {
            Ok(url) => url,
            Err(e) => {
                debug!(target: "agentring::mcp", error = %e, "health probe skipped");
                return false;
            }
        };
        let request = self.http.get(&url).timeout(HEALTH_TIMEOUT);
        match self.send_json(&url, request).await {
            Ok(body) => body.get(field) == Some(expected),
            Err(e) => {
                debug!(target: "agentring::mcp", url = %url, error = %e, "health probe failed");
                false
            }
        }
    }

    /// Health plus the advertised tool names. Name and version come from the
    /// `get_env_info` tool when the server provides it.
    pub async fn server_info(&self) -> Result<ServerInfo, TransportError> {
        let healthy = self.health_check().await;
        let tools: Vec<String> = self
            .discover_tools()
            .await?
            .iter()
            .map(|tool| tool.name.clone())
            .collect();

        let mut info = ServerInfo {
            url: self.base_url.clone(),
            name: None,
            version: None,
            healthy,
            tools,
        };

        if info.tools.iter().any(|name| name == "get_env_info")
            && let Ok(body) = self.call_tool("get_env_info", Map::new()).await
        {
            let env_info = body.get("env_info").unwrap_or(&body);
            info.name = env_info
                .get("env_id")
                .or_else(|| env_info.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string);
            info.version = env_info
                .get("version")
                .and_then(Value::as_str)
                .map(str::to_string);
        }

        Ok(info)
    }

    async fn send_json(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, TransportError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url, self.timeout, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::status(url, status.as_u16(), &body));
        }

        let text = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(url, self.timeout, &e))?;
        serde_json::from_str(&text).map_err(|e| TransportError::malformed(url, e.to_string()))
    }
}

/// Validate a server URL and strip trailing slashes so paths can be appended.
pub(crate) fn normalize_server_url(raw: &str) -> Result<String, TransportError> {
    let trimmed = raw.trim();
    let invalid = |message: &str| TransportError::InvalidUrl {
        url: raw.to_string(),
        message: message.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid("URL is empty"));
    }
    let parsed = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("URL has no host"));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::TransportErrorKind;
    use crate::mcp::test_servers::{FakeGymServer, spawn_server};
    use rstest::rstest;

    #[rstest]
    #[case("http://localhost:8070/", "http://localhost:8070")]
    #[case("https://gym.example.com/api//", "https://gym.example.com/api")]
    #[case("  http://127.0.0.1:9000  ", "http://127.0.0.1:9000")]
    fn normalizes_server_urls(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_server_url(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("localhost:8070")]
    #[case("ftp://example.com")]
    #[case("not a url")]
    fn rejects_bad_server_urls(#[case] raw: &str) {
        let err = normalize_server_url(raw).unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl { .. }), "{err}");
    }

    #[rstest]
    #[case("http://localhost:8070", "step_env", "http://localhost:8070/mcp/v1/tools/step_env/call")]
    #[case("http://localhost:8070/api", "a/b", "http://localhost:8070/api/mcp/v1/tools/a%2Fb/call")]
    #[case("http://localhost:8070", "list?x#y", "http://localhost:8070/mcp/v1/tools/list%3Fx%23y/call")]
    fn tool_names_stay_inside_one_path_segment(
        #[case] server: &str,
        #[case] tool: &str,
        #[case] expected: &str,
    ) {
        let client = McpClient::new(server).unwrap();
        let url = client.endpoint(&["mcp", "v1", "tools", tool, "call"]).unwrap();
        assert_eq!(url, expected);
    }

    #[tokio::test]
    async fn call_tool_posts_params_envelope_with_bearer_token() {
        let server = FakeGymServer::cart_pole().with_required_key("secret");
        let handle = spawn_server(server.clone()).await;

        let client = McpClient::new(&handle.url).unwrap().with_api_key("secret");
        let mut args = Map::new();
        args.insert("seed".into(), json!(7));
        let body = client.call_tool("reset_env", args).await.unwrap();

        assert_eq!(body["success"], true);
        assert_eq!(server.last_params("reset_env"), Some(json!({"seed": 7})));
    }

    #[tokio::test]
    async fn missing_credentials_surface_as_server_failure() {
        let handle = spawn_server(FakeGymServer::cart_pole().with_required_key("secret")).await;

        let client = McpClient::new(&handle.url).unwrap();
        let err = client.call_tool("get_env_info", Map::new()).await.unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::ServerFailure);
        assert!(matches!(err, TransportError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn connection_refused_is_a_connection_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = McpClient::new(&format!("http://{addr}")).unwrap();
        let err = client.call_tool("reset_env", Map::new()).await.unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::Connection);
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let server = FakeGymServer::cart_pole().with_delay(Duration::from_millis(500));
        let handle = spawn_server(server).await;

        let client = McpClient::new(&handle.url)
            .unwrap()
            .with_timeout(Duration::from_millis(50));
        let err = client.call_tool("reset_env", Map::new()).await.unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::Timeout);
    }

    #[tokio::test]
    async fn discovery_is_cached_and_skips_malformed_entries() {
        let server = FakeGymServer::cart_pole().with_extra_tool_entry(json!({"description": "nameless"}));
        let handle = spawn_server(server.clone()).await;
        let client = McpClient::new(&handle.url).unwrap();

        let names: Vec<String> = client
            .discover_tools()
            .await
            .unwrap()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(
            names,
            vec!["get_env_info", "reset_env", "step_env", "render_env", "close_env"]
        );

        client.discover_tools().await.unwrap();
        assert_eq!(server.list_requests(), 1);
    }

    #[tokio::test]
    async fn health_check_falls_back_to_info() {
        let handle = spawn_server(FakeGymServer::cart_pole().without_health_endpoint()).await;
        let client = McpClient::new(&handle.url).unwrap();
        assert!(client.health_check().await);

        let unreachable = McpClient::new("http://127.0.0.1:9").unwrap();
        assert!(!unreachable.health_check().await);
    }

    #[tokio::test]
    async fn server_info_reports_tools_and_env_id() {
        let handle = spawn_server(FakeGymServer::cart_pole()).await;
        let client = McpClient::new(&handle.url).unwrap();

        let info = client.server_info().await.unwrap();
        assert!(info.healthy);
        assert_eq!(info.name.as_deref(), Some("CartPole-v1"));
        assert!(info.tools.contains(&"step_env".to_string()));
    }
}
