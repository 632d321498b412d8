//! One reset/step/render/close contract over local and remote environments.

mod backend;
mod error;
mod local;
mod remote;

pub use backend::EnvBackend;
pub use error::{BackendFailure, SessionError};
pub use local::LocalBackend;
pub use remote::RemoteBackend;
pub(crate) use remote::{RESET_ENV, STEP_ENV};

use std::fmt;

use agentring_spaces::{Space, SpaceValue, encode_at};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{Mode, SessionConfig};
use crate::env::{EnvRegistry, Info, RenderFrame, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Ready,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => f.write_str("uninitialized"),
            SessionState::Ready => f.write_str("ready"),
            SessionState::Closed => f.write_str("closed"),
        }
    }
}

/// A live environment instance.
///
/// Lifecycle is `Uninitialized -> Ready -> Closed`: `step` requires a prior
/// successful `reset`, nothing but `close` is legal once closed, and `close`
/// may be called any number of times. A session is not meant to be shared
/// between concurrent callers.
pub struct Session {
    env_id: String,
    mode: Mode,
    state: SessionState,
    backend: Box<dyn EnvBackend>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("env_id", &self.env_id)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Validate `config` and open a session in the configured mode.
    ///
    /// Configuration problems are reported before any environment is
    /// constructed or any request is sent. `registry` is only consulted in
    /// local mode.
    pub async fn open(mut config: SessionConfig, registry: &EnvRegistry) -> Result<Self, SessionError> {
        config.validate()?;
        let backend: Box<dyn EnvBackend> = match config.mode {
            Mode::Local => Box::new(LocalBackend::from_config(&config, registry)?),
            Mode::Remote => Box::new(RemoteBackend::connect(&config).await?),
        };
        let session = Self::from_backend(config.env_id, config.mode, backend);
        info!(
            target: "agentring::session",
            env_id = %session.env_id,
            mode = %session.mode,
            "session opened"
        );
        Ok(session)
    }

    pub async fn local(config: SessionConfig, registry: &EnvRegistry) -> Result<Self, SessionError> {
        Self::open(SessionConfig { mode: Mode::Local, ..config }, registry).await
    }

    pub async fn remote(config: SessionConfig) -> Result<Self, SessionError> {
        Self::open(SessionConfig { mode: Mode::Remote, ..config }, &EnvRegistry::new()).await
    }

    /// Wrap an already constructed backend.
    pub fn from_backend(env_id: impl Into<String>, mode: Mode, backend: Box<dyn EnvBackend>) -> Self {
        Self {
            env_id: env_id.into(),
            mode,
            state: SessionState::Uninitialized,
            backend,
        }
    }

    pub fn env_id(&self) -> &str {
        &self.env_id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn observation_space(&self) -> &Space {
        self.backend.observation_space()
    }

    pub fn action_space(&self) -> &Space {
        self.backend.action_space()
    }

    pub fn reward_range(&self) -> (f64, f64) {
        self.backend.reward_range()
    }

    pub fn metadata(&self) -> &Info {
        self.backend.metadata()
    }

    fn require_open(&self, operation: &'static str) -> Result<(), SessionError> {
        if self.state == SessionState::Closed {
            return Err(SessionError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Start a new episode. On failure the session keeps its prior state so
    /// the call may be retried.
    pub async fn reset(
        &mut self,
        seed: Option<u64>,
        options: Option<Info>,
    ) -> Result<(SpaceValue, Info), SessionError> {
        self.require_open("reset")?;
        let result = self.backend.reset(seed, options).await?;
        self.state = SessionState::Ready;
        Ok(result)
    }

    /// Apply `action`. Actions that do not fit the action space are rejected
    /// before the backend sees them.
    pub async fn step(&mut self, action: &SpaceValue) -> Result<Step, SessionError> {
        if self.state != SessionState::Ready {
            return Err(SessionError::InvalidState {
                operation: "step",
                state: self.state,
            });
        }
        encode_at(action, self.backend.action_space(), "action")?;
        self.backend.step(action).await
    }

    pub async fn render(&mut self) -> Result<Option<RenderFrame>, SessionError> {
        self.require_open("render")?;
        self.backend.render().await
    }

    /// Release the environment. Teardown failures are logged, never returned.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Err(e) = self.backend.close().await {
            warn!(
                target: "agentring::session",
                env_id = %self.env_id,
                error = %e,
                "environment teardown failed"
            );
        }
        self.state = SessionState::Closed;
        info!(target: "agentring::session", env_id = %self.env_id, "session closed");
    }
}
