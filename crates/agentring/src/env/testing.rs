//! Deterministic environments for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use agentring_spaces::{BoxSpace, Space, SpaceValue};
use serde_json::json;

use super::{EnvError, Environment, Info, RenderFrame, Step};

/// Box(1) observation counting steps, Discrete(2) action, reward 1.0 per step,
/// terminating after `episode_len` steps.
#[derive(Debug, Clone)]
pub(crate) struct CountingEnv {
    pub episode_len: u64,
    pub steps: u64,
    /// Shared across clones so a test can keep a handle after boxing.
    pub closes: Arc<AtomicUsize>,
    pub fail_reset: bool,
    observation_space: Space,
    action_space: Space,
}

impl CountingEnv {
    pub fn new(episode_len: u64) -> Self {
        Self {
            episode_len,
            steps: 0,
            closes: Arc::new(AtomicUsize::new(0)),
            fail_reset: false,
            observation_space: Space::Box(BoxSpace::uniform(0.0, 1000.0, vec![1])),
            action_space: Space::discrete(2),
        }
    }

    fn observation(&self) -> SpaceValue {
        SpaceValue::Box(vec![self.steps as f64])
    }
}

impl Environment for CountingEnv {
    fn observation_space(&self) -> &Space {
        &self.observation_space
    }

    fn action_space(&self) -> &Space {
        &self.action_space
    }

    fn reset(&mut self, seed: Option<u64>, _: Option<&Info>) -> Result<(SpaceValue, Info), EnvError> {
        if self.fail_reset {
            return Err(EnvError::failed("reset", "simulator unavailable"));
        }
        self.steps = 0;
        let mut info = Info::new();
        info.insert("seed".into(), json!(seed));
        Ok((self.observation(), info))
    }

    fn step(&mut self, _action: &SpaceValue) -> Result<Step, EnvError> {
        self.steps += 1;
        Ok(Step {
            observation: self.observation(),
            reward: 1.0,
            terminated: self.steps >= self.episode_len,
            truncated: false,
            info: Info::new(),
        })
    }

    fn render(&mut self) -> Result<Option<RenderFrame>, EnvError> {
        Ok(Some(RenderFrame::Text(format!("step {}", self.steps))))
    }

    fn close(&mut self) -> Result<(), EnvError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
