use agentring_spaces::{Space, SpaceValue, encode_at};
use async_trait::async_trait;

use super::{EnvBackend, SessionError};
use crate::env::{EnvRegistry, Environment, Info, RenderFrame, Step};
use crate::config::SessionConfig;

/// Drives an [`Environment`] in the calling task.
pub struct LocalBackend {
    env: Box<dyn Environment>,
    metadata: Info,
}

impl LocalBackend {
    pub fn new(env: Box<dyn Environment>) -> Self {
        let metadata = env.metadata();
        Self { env, metadata }
    }

    pub fn from_config(config: &SessionConfig, registry: &EnvRegistry) -> Result<Self, SessionError> {
        Ok(Self::new(registry.make(&config.env_id, &config.env_options())?))
    }

    fn check_observation(&self, observation: &SpaceValue) -> Result<(), SessionError> {
        encode_at(observation, self.env.observation_space(), "observation")?;
        Ok(())
    }
}

#[async_trait]
impl EnvBackend for LocalBackend {
    fn observation_space(&self) -> &Space {
        self.env.observation_space()
    }

    fn action_space(&self) -> &Space {
        self.env.action_space()
    }

    fn reward_range(&self) -> (f64, f64) {
        self.env.reward_range()
    }

    fn metadata(&self) -> &Info {
        &self.metadata
    }

    async fn reset(
        &mut self,
        seed: Option<u64>,
        options: Option<Info>,
    ) -> Result<(SpaceValue, Info), SessionError> {
        let (observation, info) = self
            .env
            .reset(seed, options.as_ref())
            .map_err(|e| SessionError::from_env("reset", e))?;
        self.check_observation(&observation)?;
        Ok((observation, info))
    }

    async fn step(&mut self, action: &SpaceValue) -> Result<Step, SessionError> {
        let step = self
            .env
            .step(action)
            .map_err(|e| SessionError::from_env("step", e))?;
        self.check_observation(&step.observation)?;
        Ok(step)
    }

    async fn render(&mut self) -> Result<Option<RenderFrame>, SessionError> {
        self.env
            .render()
            .map_err(|e| SessionError::from_env("render", e))
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.env
            .close()
            .map_err(|e| SessionError::from_env("close", e))
    }
}
