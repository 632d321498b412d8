use agentring_spaces::{SpaceValue, encode};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use thiserror::Error;

use super::AgentError;
use crate::env::Info;
use crate::session::{RESET_ENV, STEP_ENV, Session, SessionError};
use crate::tools::{McpTool, ToolError, ToolSet};

/// Why an episode stopped early.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EpisodeError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error("{tool} returned an unexpected result: {message}")]
    Malformed { tool: String, message: String },
}

/// Outcome of a single environment step, generic over the observation type.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<O> {
    pub observation: O,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub info: Info,
}

impl<O> Transition<O> {
    pub fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Something an [`EpisodeRunner`](super::EpisodeRunner) can reset and step.
#[async_trait]
pub trait EpisodeDriver: Send {
    type Observation: Send + Sync;
    type Action: Send + Sync;

    async fn reset(&mut self, seed: Option<u64>) -> Result<(Self::Observation, Info), EpisodeError>;

    async fn step(
        &mut self,
        action: &Self::Action,
    ) -> Result<Transition<Self::Observation>, EpisodeError>;

    /// JSON form of an observation for step records.
    fn observation_json(&self, observation: &Self::Observation) -> Value;

    /// JSON form of an action for step records.
    fn action_json(&self, action: &Self::Action) -> Value;
}

#[async_trait]
impl EpisodeDriver for Session {
    type Observation = SpaceValue;
    type Action = SpaceValue;

    async fn reset(&mut self, seed: Option<u64>) -> Result<(SpaceValue, Info), EpisodeError> {
        Ok(Session::reset(self, seed, None).await?)
    }

    async fn step(&mut self, action: &SpaceValue) -> Result<Transition<SpaceValue>, EpisodeError> {
        let step = Session::step(self, action).await?;
        Ok(Transition {
            observation: step.observation,
            reward: step.reward,
            terminated: step.terminated,
            truncated: step.truncated,
            info: step.info,
        })
    }

    fn observation_json(&self, observation: &SpaceValue) -> Value {
        encode(observation, self.observation_space()).unwrap_or(Value::Null)
    }

    fn action_json(&self, action: &SpaceValue) -> Value {
        encode(action, self.action_space()).unwrap_or(Value::Null)
    }
}

/// Drives an environment through its reset and step tools directly, with
/// observations and actions left as raw JSON.
#[derive(Debug, Clone)]
pub struct ToolDriver {
    reset: McpTool,
    step: McpTool,
}

impl ToolDriver {
    /// Use the conventional `reset_env` and `step_env` tools from `tools`.
    pub fn new(tools: &ToolSet) -> Result<Self, ToolError> {
        Self::with_names(tools, RESET_ENV, STEP_ENV)
    }

    pub fn with_names(tools: &ToolSet, reset: &str, step: &str) -> Result<Self, ToolError> {
        let find = |name: &str| {
            tools
                .get(name)
                .cloned()
                .ok_or_else(|| ToolError::unknown_tool(name, tools.names()))
        };
        Ok(Self {
            reset: find(reset)?,
            step: find(step)?,
        })
    }

    pub fn reset_tool(&self) -> &McpTool {
        &self.reset
    }

    pub fn step_tool(&self) -> &McpTool {
        &self.step
    }
}

fn result_object(tool: &McpTool, result: Value) -> Result<Map<String, Value>, EpisodeError> {
    match result {
        Value::Object(body) => Ok(body),
        other => Err(EpisodeError::Malformed {
            tool: tool.name().to_string(),
            message: format!("expected an object, got {other}"),
        }),
    }
}

fn take_info(body: &mut Map<String, Value>) -> Info {
    match body.remove("info") {
        Some(Value::Object(info)) => info,
        _ => Info::new(),
    }
}

#[async_trait]
impl EpisodeDriver for ToolDriver {
    type Observation = Value;
    type Action = Value;

    async fn reset(&mut self, seed: Option<u64>) -> Result<(Value, Info), EpisodeError> {
        let mut args = Map::new();
        if let Some(seed) = seed {
            args.insert("seed".into(), json!(seed));
        }
        let result = self.reset.call(args).await?;
        let mut body = result_object(&self.reset, result)?;
        let observation = body.remove("observation").unwrap_or(Value::Null);
        Ok((observation, take_info(&mut body)))
    }

    async fn step(&mut self, action: &Value) -> Result<Transition<Value>, EpisodeError> {
        let mut args = Map::new();
        args.insert("action".into(), action.clone());
        let result = self.step.call(args).await?;
        let mut body = result_object(&self.step, result)?;
        Ok(Transition {
            observation: body.remove("observation").unwrap_or(Value::Null),
            reward: body.get("reward").and_then(Value::as_f64).unwrap_or(0.0),
            terminated: body.get("terminated").and_then(Value::as_bool).unwrap_or(false),
            truncated: body.get("truncated").and_then(Value::as_bool).unwrap_or(false),
            info: take_info(&mut body),
        })
    }

    fn observation_json(&self, observation: &Value) -> Value {
        observation.clone()
    }

    fn action_json(&self, action: &Value) -> Value {
        action.clone()
    }
}
