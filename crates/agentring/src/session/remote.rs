use agentring_spaces::{Space, SpaceValue, decode_at, encode_at};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::{BackendFailure, EnvBackend, SessionError};
use crate::config::SessionConfig;
use crate::env::{Info, RenderFrame, Step};
use crate::mcp::McpClient;
use crate::tools::failure_message;

pub(crate) const GET_ENV_INFO: &str = "get_env_info";
pub(crate) const RESET_ENV: &str = "reset_env";
pub(crate) const STEP_ENV: &str = "step_env";
pub(crate) const RENDER_ENV: &str = "render_env";
pub(crate) const CLOSE_ENV: &str = "close_env";

/// Drives an environment hosted by a gym tool server.
///
/// Spaces are fetched once at connect time and stay fixed for the life of
/// the backend; a failed reset does not re-query them.
#[derive(Debug)]
pub struct RemoteBackend {
    client: McpClient,
    observation_space: Space,
    action_space: Space,
    reward_range: (f64, f64),
    metadata: Info,
    render_mode: Option<String>,
    render_advertised: bool,
}

impl RemoteBackend {
    /// Connect using an already validated configuration.
    pub async fn connect(config: &SessionConfig) -> Result<Self, SessionError> {
        let url = config.server_url.as_deref().ok_or_else(|| {
            SessionError::Configuration("remote mode requires server_url".into())
        })?;
        let mut client = McpClient::new(url)
            .map_err(|e| SessionError::Configuration(e.to_string()))?
            .with_timeout(config.timeout);
        if let Some(key) = &config.api_key {
            client = client.with_api_key(key.clone());
        }

        let info = call(&client, "connect", GET_ENV_INFO, Map::new()).await?;
        // Some servers nest the payload under `env_info`.
        let nested = match info.get("env_info") {
            Some(Value::Object(inner)) if !info.contains_key("observation_space") => {
                Some(inner.clone())
            }
            _ => None,
        };
        let info = nested.unwrap_or(info);

        let observation_space = parse_space(&info, "observation_space")?;
        let action_space = parse_space(&info, "action_space")?;

        if let Some(server_env) = info.get("env_id").and_then(Value::as_str)
            && server_env != config.env_id
        {
            warn!(
                target: "agentring::session",
                requested = %config.env_id,
                server = server_env,
                "server hosts a different environment than requested"
            );
        }

        let render_advertised = match client.discover_tools().await {
            Ok(tools) => tools.iter().any(|tool| tool.name == RENDER_ENV),
            Err(e) => {
                debug!(target: "agentring::session", error = %e, "tool discovery failed; assuming render_env exists");
                true
            }
        };

        Ok(Self {
            reward_range: parse_reward_range(info.get("reward_range")),
            metadata: info
                .get("metadata")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            render_mode: config.render_mode.clone(),
            render_advertised,
            observation_space,
            action_space,
            client,
        })
    }

    pub fn client(&self) -> &McpClient {
        &self.client
    }

    fn decode_observation(&self, body: &Map<String, Value>) -> Result<SpaceValue, SessionError> {
        let observation = body.get("observation").unwrap_or(&Value::Null);
        Ok(decode_at(observation, &self.observation_space, "observation")?)
    }
}

/// Call `tool` and unwrap the `{"success": bool, ...}` envelope.
async fn call(
    client: &McpClient,
    operation: &'static str,
    tool: &str,
    arguments: Map<String, Value>,
) -> Result<Map<String, Value>, SessionError> {
    let body = client
        .call_tool(tool, arguments)
        .await
        .map_err(|e| SessionError::backend(operation, e))?;

    let Value::Object(body) = body else {
        return Err(SessionError::backend(
            operation,
            BackendFailure::Malformed(format!("{tool} returned a non-object body")),
        ));
    };
    if body.get("success").and_then(Value::as_bool) != Some(true) {
        return Err(SessionError::backend(
            operation,
            BackendFailure::Rejected(failure_message(&Value::Object(body))),
        ));
    }
    Ok(body)
}

fn parse_space(info: &Map<String, Value>, field: &str) -> Result<Space, SessionError> {
    let schema = info.get(field).ok_or_else(|| {
        SessionError::backend(
            "connect",
            BackendFailure::Malformed(format!("environment info has no {field}")),
        )
    })?;
    Ok(Space::from_json_at(schema, field)?)
}

fn parse_reward_range(value: Option<&Value>) -> (f64, f64) {
    let bound = |v: &Value, default: f64| match v {
        Value::Number(n) => n.as_f64().unwrap_or(default),
        Value::String(s) if s.eq_ignore_ascii_case("infinity") || s == "inf" => f64::INFINITY,
        Value::String(s) if s.eq_ignore_ascii_case("-infinity") || s == "-inf" => f64::NEG_INFINITY,
        _ => default,
    };
    match value.and_then(Value::as_array).map(Vec::as_slice) {
        Some([low, high]) => (bound(low, f64::NEG_INFINITY), bound(high, f64::INFINITY)),
        _ => (f64::NEG_INFINITY, f64::INFINITY),
    }
}

fn info_of(body: &Map<String, Value>) -> Info {
    body.get("info")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

#[async_trait]
impl EnvBackend for RemoteBackend {
    fn observation_space(&self) -> &Space {
        &self.observation_space
    }

    fn action_space(&self) -> &Space {
        &self.action_space
    }

    fn reward_range(&self) -> (f64, f64) {
        self.reward_range
    }

    fn metadata(&self) -> &Info {
        &self.metadata
    }

    async fn reset(
        &mut self,
        seed: Option<u64>,
        options: Option<Info>,
    ) -> Result<(SpaceValue, Info), SessionError> {
        let mut params = Map::new();
        if let Some(seed) = seed {
            params.insert("seed".into(), json!(seed));
        }
        if let Some(options) = options {
            params.insert("options".into(), Value::Object(options));
        }

        let body = call(&self.client, "reset", RESET_ENV, params).await?;
        Ok((self.decode_observation(&body)?, info_of(&body)))
    }

    async fn step(&mut self, action: &SpaceValue) -> Result<Step, SessionError> {
        let mut params = Map::new();
        params.insert(
            "action".into(),
            encode_at(action, &self.action_space, "action")?,
        );

        let body = call(&self.client, "step", STEP_ENV, params).await?;
        Ok(Step {
            observation: self.decode_observation(&body)?,
            reward: body.get("reward").and_then(Value::as_f64).unwrap_or(0.0),
            terminated: body.get("terminated").and_then(Value::as_bool).unwrap_or(false),
            truncated: body.get("truncated").and_then(Value::as_bool).unwrap_or(false),
            info: info_of(&body),
        })
    }

    async fn render(&mut self) -> Result<Option<RenderFrame>, SessionError> {
        if !self.render_advertised {
            return Err(SessionError::UnsupportedOperation("render"));
        }
        let mut params = Map::new();
        if let Some(mode) = &self.render_mode {
            params.insert("mode".into(), json!(mode));
        }

        let mut body = call(&self.client, "render", RENDER_ENV, params).await?;
        Ok(match body.remove("render") {
            None | Some(Value::Null) => None,
            Some(frame) => Some(RenderFrame::from_json(frame)),
        })
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        call(&self.client, "close", CLOSE_ENV, Map::new()).await?;
        Ok(())
    }
}
