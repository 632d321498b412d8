use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::mcp::{DEFAULT_TIMEOUT, TransportError};

pub const ENV_ID_VAR: &str = "AGENTRING_ENV_ID";
pub const MODE_VAR: &str = "AGENTRING_MODE";
pub const SERVER_URL_VAR: &str = "GYM_SERVER_URL";
pub const SERVER_KEY_VAR: &str = "GYM_SERVER_KEY";
pub const RENDER_MODE_VAR: &str = "AGENTRING_RENDER_MODE";
pub const TIMEOUT_VAR: &str = "AGENTRING_TIMEOUT_SECS";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Mode {
    #[default]
    Local,
    Remote,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Local => "local",
            Mode::Remote => "remote",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Mode::Local),
            "remote" => Ok(Mode::Remote),
            _ => Err(ConfigError::Invalid(format!(
                "mode must be 'local' or 'remote', got '{s}'"
            ))),
        }
    }
}

impl TryFrom<String> for Mode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Everything needed to open a [`Session`](crate::Session).
///
/// `server_url` is required in remote mode and ignored in local mode;
/// `options` is handed to the local environment constructor unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub env_id: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|_| D::Error::custom(format!("timeout must be a non-negative number of seconds, got {secs}")))
    }
}

impl SessionConfig {
    pub fn local(env_id: impl Into<String>) -> Self {
        Self {
            env_id: env_id.into(),
            mode: Mode::Local,
            render_mode: None,
            server_url: None,
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            options: Map::new(),
        }
    }

    pub fn remote(env_id: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            mode: Mode::Remote,
            server_url: Some(server_url.into()),
            ..Self::local(env_id)
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_render_mode(mut self, mode: impl Into<String>) -> Self {
        self.render_mode = Some(mode.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Read the configuration from the process environment, loading a `.env`
    /// file first when one is present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!(target: "agentring::config", error = %e, "no .env file loaded");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let env_id = get(ENV_ID_VAR)
            .ok_or_else(|| ConfigError::Invalid(format!("{ENV_ID_VAR} is not set")))?;
        let server_url = get(SERVER_URL_VAR);
        let mode = match get(MODE_VAR) {
            Some(mode) => mode.parse()?,
            None if server_url.is_some() => Mode::Remote,
            None => Mode::Local,
        };
        let timeout = match get(TIMEOUT_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "{TIMEOUT_VAR} must be a non-negative number of seconds, got '{raw}'"
                    ))
                })?,
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            env_id,
            mode,
            render_mode: get(RENDER_MODE_VAR),
            server_url,
            api_key: get(SERVER_KEY_VAR),
            timeout,
            options: Map::new(),
        })
    }

    /// Check the configuration before any I/O and normalize the server URL.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.env_id.trim().is_empty() {
            return Err(ConfigError::Invalid("env_id must not be empty".into()));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be greater than zero".into()));
        }
        if self.mode == Mode::Remote {
            let Some(url) = self.server_url.as_deref() else {
                return Err(ConfigError::Invalid(
                    "remote mode requires server_url (or GYM_SERVER_URL)".into(),
                ));
            };
            let normalized = crate::mcp::normalize_server_url(url).map_err(|e| match e {
                TransportError::InvalidUrl { url, message } => {
                    ConfigError::Invalid(format!("server_url '{url}': {message}"))
                }
                other => ConfigError::Invalid(other.to_string()),
            })?;
            self.server_url = Some(normalized);
        }
        Ok(())
    }

    pub(crate) fn env_options(&self) -> crate::env::EnvOptions {
        crate::env::EnvOptions {
            render_mode: self.render_mode.clone(),
            options: self.options.clone(),
        }
    }
}
