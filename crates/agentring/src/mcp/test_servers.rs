//! In-process gym tool server for exercising the HTTP client paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
struct Config {
    env_id: String,
    observation_space: Value,
    action_space: Value,
    observation: Option<Value>,
    episode_len: u64,
    required_key: Option<String>,
    delay: Option<Duration>,
    health_endpoint: bool,
    render_tool: bool,
    extra_tool_entries: Vec<Value>,
    failing_tools: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct Record {
    steps: u64,
    list_requests: usize,
    calls: HashMap<String, usize>,
    last_params: HashMap<String, Value>,
}

/// Fake gym server: a Box(4) observation, Discrete(2) action and an episode
/// that terminates after `episode_len` steps with reward 1.0 per step.
#[derive(Debug, Clone)]
pub struct FakeGymServer {
    config: Arc<Config>,
    record: Arc<Mutex<Record>>,
}

pub struct ServerHandle {
    pub url: String,
    task: JoinHandle<()>,
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl FakeGymServer {
    pub fn cart_pole() -> Self {
        Self {
            config: Arc::new(Config {
                env_id: "CartPole-v1".to_string(),
                observation_space: json!({
                    "type": "Box",
                    "low": [-4.8, "-Infinity", -0.42, "-Infinity"],
                    "high": [4.8, "Infinity", 0.42, "Infinity"],
                    "shape": [4],
                    "dtype": "float32"
                }),
                action_space: json!({"type": "Discrete", "n": 2}),
                observation: None,
                episode_len: 5,
                required_key: None,
                delay: None,
                health_endpoint: true,
                render_tool: true,
                extra_tool_entries: Vec::new(),
                failing_tools: HashMap::new(),
            }),
            record: Arc::default(),
        }
    }

    fn map_config(mut self, f: impl FnOnce(&mut Config)) -> Self {
        f(Arc::make_mut(&mut self.config));
        self
    }

    pub fn with_env_id(self, env_id: &str) -> Self {
        self.map_config(|c| c.env_id = env_id.to_string())
    }

    pub fn with_spaces(self, observation_space: Value, action_space: Value) -> Self {
        self.map_config(|c| {
            c.observation_space = observation_space;
            c.action_space = action_space;
        })
    }

    /// Fixed observation returned from every reset and step.
    pub fn with_observation(self, observation: Value) -> Self {
        self.map_config(|c| c.observation = Some(observation))
    }

    pub fn with_episode_len(self, steps: u64) -> Self {
        self.map_config(|c| c.episode_len = steps)
    }

    pub fn with_required_key(self, key: &str) -> Self {
        self.map_config(|c| c.required_key = Some(key.to_string()))
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.map_config(|c| c.delay = Some(delay))
    }

    pub fn without_health_endpoint(self) -> Self {
        self.map_config(|c| c.health_endpoint = false)
    }

    pub fn without_render_tool(self) -> Self {
        self.map_config(|c| c.render_tool = false)
    }

    pub fn with_extra_tool_entry(self, entry: Value) -> Self {
        self.map_config(|c| c.extra_tool_entries.push(entry))
    }

    /// Make `tool` answer with `{"success": false, "error": message}`.
    pub fn failing(self, tool: &str, message: &str) -> Self {
        self.map_config(|c| {
            c.failing_tools.insert(tool.to_string(), message.to_string());
        })
    }

    pub fn calls(&self, tool: &str) -> usize {
        self.record.lock().unwrap().calls.get(tool).copied().unwrap_or(0)
    }

    pub fn last_params(&self, tool: &str) -> Option<Value> {
        self.record.lock().unwrap().last_params.get(tool).cloned()
    }

    pub fn list_requests(&self) -> usize {
        self.record.lock().unwrap().list_requests
    }

    fn tool_entries(&self) -> Vec<Value> {
        let mut tools = vec![
            json!({
                "name": "get_env_info",
                "description": "Get information about the environment",
                "parameters": {"type": "object", "properties": {}}
            }),
            json!({
                "name": "reset_env",
                "description": "Reset the environment to start a new episode",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "seed": {"type": ["integer", "null"], "description": "Optional random seed"},
                        "options": {"type": ["object", "null"]}
                    }
                }
            }),
            json!({
                "name": "step_env",
                "description": "Take an action in the environment",
                "parameters": {
                    "type": "object",
                    "properties": {"action": {"description": "The action to execute"}},
                    "required": ["action"]
                }
            }),
        ];
        if self.config.render_tool {
            tools.push(json!({
                "name": "render_env",
                "description": "Render the environment",
                "parameters": {
                    "type": "object",
                    "properties": {"mode": {"type": "string", "enum": ["rgb_array", "ansi"]}}
                }
            }));
        }
        tools.push(json!({
            "name": "close_env",
            "description": "Close the environment and free resources",
            "parameters": {"type": "object", "properties": {}}
        }));
        tools.extend(self.config.extra_tool_entries.iter().cloned());
        tools
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(key) = &self.config.required_key else {
            return true;
        };
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == format!("Bearer {key}"))
    }

    fn observation(&self, steps: u64) -> Value {
        self.config
            .observation
            .clone()
            .unwrap_or_else(|| json!([steps as f64 * 0.01, 0.0, 0.0, 0.0]))
    }

    fn handle_call(&self, name: &str, params: Value) -> Response {
        let mut record = self.record.lock().unwrap();
        *record.calls.entry(name.to_string()).or_default() += 1;
        record.last_params.insert(name.to_string(), params.clone());

        if let Some(message) = self.config.failing_tools.get(name) {
            return Json(json!({"success": false, "error": message})).into_response();
        }

        let body = match name {
            "get_env_info" => json!({
                "success": true,
                "env_id": self.config.env_id,
                "observation_space": self.config.observation_space,
                "action_space": self.config.action_space,
                "reward_range": [0.0, 500.0],
                "metadata": {"render_modes": ["rgb_array"], "render_fps": 50}
            }),
            "reset_env" => {
                record.steps = 0;
                json!({
                    "success": true,
                    "observation": self.observation(0),
                    "info": {"seed": params.get("seed").cloned().unwrap_or(Value::Null)}
                })
            }
            "step_env" => {
                if params.get("action").is_none() {
                    return Json(json!({"success": false, "error": "missing action"}))
                        .into_response();
                }
                record.steps += 1;
                let steps = record.steps;
                json!({
                    "success": true,
                    "observation": self.observation(steps),
                    "reward": 1.0,
                    "terminated": steps >= self.config.episode_len,
                    "truncated": false,
                    "info": {"step": steps}
                })
            }
            "render_env" if self.config.render_tool => json!({
                "success": true,
                "render": [[[0, 0, 0], [255, 255, 255]]],
                "mode": params.get("mode").cloned().unwrap_or(json!("rgb_array"))
            }),
            "close_env" => json!({"success": true}),
            other => {
                return (
                    StatusCode::NOT_FOUND,
                    Json(json!({"success": false, "error": format!("unknown tool {other}")})),
                )
                    .into_response();
            }
        };
        Json(body).into_response()
    }
}

async fn call_tool(
    State(server): State<FakeGymServer>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(delay) = server.config.delay {
        tokio::time::sleep(delay).await;
    }
    if !server.authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "missing or invalid bearer token").into_response();
    }
    let params = body.get("params").cloned().unwrap_or_else(|| json!({}));
    server.handle_call(&name, params)
}

async fn list_tools(State(server): State<FakeGymServer>) -> Response {
    server.record.lock().unwrap().list_requests += 1;
    Json(json!({"tools": server.tool_entries()})).into_response()
}

async fn health(State(server): State<FakeGymServer>) -> Response {
    if server.config.health_endpoint {
        Json(json!({"status": "healthy"})).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn info(State(server): State<FakeGymServer>) -> Response {
    Json(json!({"success": true, "env_id": server.config.env_id})).into_response()
}

pub async fn spawn_server(server: FakeGymServer) -> ServerHandle {
    let app = Router::new()
        .route("/mcp/v1/tools/{name}/call", post(call_tool))
        .route("/mcp/v1/tools/list", get(list_tools))
        .route("/health", get(health))
        .route("/info", get(info))
        .with_state(server);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    ServerHandle {
        url: format!("http://{addr}"),
        task,
    }
}
