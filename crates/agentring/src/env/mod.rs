//! The capability interface an in-process environment must provide.

mod registry;
#[cfg(test)]
pub(crate) mod testing;

pub use registry::{EnvConstructor, EnvRegistry};

use agentring_spaces::{Space, SpaceError, SpaceValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Free-form diagnostic mapping returned alongside observations.
pub type Info = Map<String, Value>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    #[error("{operation} failed: {message}")]
    Failed {
        operation: &'static str,
        message: String,
    },

    #[error("environment does not support {0}")]
    Unsupported(&'static str),

    #[error(transparent)]
    Space(#[from] SpaceError),
}

impl EnvError {
    pub fn failed(operation: &'static str, message: impl Into<String>) -> Self {
        EnvError::Failed {
            operation,
            message: message.into(),
        }
    }
}

/// Outcome of one environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub observation: SpaceValue,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub info: Info,
}

impl Step {
    pub fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Rendered output of an environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "frame", rename_all = "snake_case")]
pub enum RenderFrame {
    Text(String),
    /// Row-major `height x width x channels` bytes.
    Pixels {
        height: usize,
        width: usize,
        channels: usize,
        data: Vec<u8>,
    },
    Raw(Value),
}

impl RenderFrame {
    /// Interpret a rendered payload: strings are text, `[h][w][c]` arrays of
    /// bytes are pixels, anything else is kept as raw JSON.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(text) => RenderFrame::Text(text),
            other => match pixels_from_json(&other) {
                Some(frame) => frame,
                None => RenderFrame::Raw(other),
            },
        }
    }
}

fn pixels_from_json(value: &Value) -> Option<RenderFrame> {
    let rows = value.as_array()?;
    let height = rows.len();
    let width = rows.first()?.as_array()?.len();
    let channels = rows.first()?.as_array()?.first()?.as_array()?.len();
    if height == 0 || width == 0 || channels == 0 {
        return None;
    }

    let mut data = Vec::with_capacity(height * width * channels);
    for row in rows {
        let row = row.as_array().filter(|r| r.len() == width)?;
        for pixel in row {
            let pixel = pixel.as_array().filter(|p| p.len() == channels)?;
            for channel in pixel {
                data.push(u8::try_from(channel.as_u64()?).ok()?);
            }
        }
    }
    Some(RenderFrame::Pixels {
        height,
        width,
        channels,
        data,
    })
}

/// Construction options passed through to an environment constructor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvOptions {
    pub render_mode: Option<String>,
    #[serde(default)]
    pub options: Map<String, Value>,
}

/// An in-process simulation environment.
///
/// Implementors own their dynamics; this crate only drives them. Spaces must
/// not change for the lifetime of the instance.
pub trait Environment: Send {
    fn observation_space(&self) -> &Space;

    fn action_space(&self) -> &Space;

    fn reset(
        &mut self,
        seed: Option<u64>,
        options: Option<&Info>,
    ) -> Result<(SpaceValue, Info), EnvError>;

    fn step(&mut self, action: &SpaceValue) -> Result<Step, EnvError>;

    fn render(&mut self) -> Result<Option<RenderFrame>, EnvError> {
        Err(EnvError::Unsupported("render"))
    }

    fn close(&mut self) -> Result<(), EnvError> {
        Ok(())
    }

    fn reward_range(&self) -> (f64, f64) {
        (f64::NEG_INFINITY, f64::INFINITY)
    }

    fn metadata(&self) -> Info {
        Info::new()
    }
}
