use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info};

use super::{Agent, EpisodeDriver, EpisodeError, EpisodeResult, EpisodeResults, StepRecord};
use crate::env::Info;

pub const DEFAULT_MAX_STEPS: usize = 200;

type SuccessFn = dyn Fn(&EpisodeResult, &Info) -> bool + Send + Sync;

/// Decides whether a finished episode counts as a success. Episodes that
/// ended in an error never do.
#[derive(Clone, Default)]
pub enum SuccessCriterion {
    /// The environment reported termination.
    #[default]
    Terminated,
    /// The episode's total reward is above zero.
    PositiveReward,
    /// The final step's info carries `true` under this key.
    InfoFlag(String),
    Custom(Arc<SuccessFn>),
}

impl SuccessCriterion {
    pub fn custom(f: impl Fn(&EpisodeResult, &Info) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    pub fn evaluate(&self, result: &EpisodeResult, last_info: &Info) -> bool {
        match self {
            Self::Terminated => result.terminated,
            Self::PositiveReward => result.total_reward > 0.0,
            Self::InfoFlag(key) => last_info.get(key) == Some(&Value::Bool(true)),
            Self::Custom(f) => f(result, last_info),
        }
    }
}

impl fmt::Debug for SuccessCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminated => f.write_str("Terminated"),
            Self::PositiveReward => f.write_str("PositiveReward"),
            Self::InfoFlag(key) => f.debug_tuple("InfoFlag").field(key).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Hard bound on steps per episode.
    pub max_steps: usize,
    /// Keep a [`StepRecord`] for every step.
    pub record_steps: bool,
    pub success: SuccessCriterion,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            record_steps: false,
            success: SuccessCriterion::default(),
        }
    }
}

impl RunnerConfig {
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_step_records(mut self) -> Self {
        self.record_steps = true;
        self
    }

    pub fn with_success(mut self, success: SuccessCriterion) -> Self {
        self.success = success;
        self
    }
}

/// Runs episodes one after another against a single driver.
///
/// Each episode starts with a fresh reset; the only state carried between
/// episodes is the episode counter.
#[derive(Debug)]
pub struct EpisodeRunner<D> {
    driver: D,
    config: RunnerConfig,
    episodes_run: usize,
}

impl<D: EpisodeDriver> EpisodeRunner<D> {
    pub fn new(driver: D) -> Self {
        Self::with_config(driver, RunnerConfig::default())
    }

    pub fn with_config(driver: D, config: RunnerConfig) -> Self {
        Self {
            driver,
            config,
            episodes_run: 0,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    pub fn episodes_run(&self) -> usize {
        self.episodes_run
    }

    /// Run one episode to completion.
    ///
    /// Failures inside the episode are captured in [`EpisodeResult::error`]
    /// rather than returned.
    pub async fn run_episode<G>(&mut self, agent: &mut G, seed: Option<u64>) -> EpisodeResult
    where
        G: Agent<D::Observation, D::Action> + ?Sized,
    {
        self.episodes_run += 1;
        let mut result = EpisodeResult::started(self.episodes_run);
        let mut last_info = Info::new();

        match self.drive(agent, seed, &mut result, &mut last_info).await {
            Ok(()) => {
                result.success = self.config.success.evaluate(&result, &last_info);
                info!(
                    target: "agentring::runner",
                    episode = result.episode_number,
                    reward = result.total_reward,
                    steps = result.step_count,
                    success = result.success,
                    "episode finished"
                );
            }
            Err(e) => {
                error!(
                    target: "agentring::runner",
                    episode = result.episode_number,
                    steps = result.step_count,
                    error = %e,
                    "episode failed"
                );
                result.success = false;
                result.error = Some(e.to_string());
            }
        }
        result
    }

    /// Run `n` episodes in sequence. `seeds[i]` seeds episode `i + 1`;
    /// episodes past the end of `seeds` are unseeded.
    pub async fn run_episodes<G>(&mut self, agent: &mut G, n: usize, seeds: Option<&[u64]>) -> EpisodeResults
    where
        G: Agent<D::Observation, D::Action> + ?Sized,
    {
        let mut results = EpisodeResults::default();
        for i in 0..n {
            let seed = seeds.and_then(|seeds| seeds.get(i).copied());
            results.push(self.run_episode(agent, seed).await);
        }
        results
    }

    async fn drive<G>(
        &mut self,
        agent: &mut G,
        seed: Option<u64>,
        result: &mut EpisodeResult,
        last_info: &mut Info,
    ) -> Result<(), EpisodeError>
    where
        G: Agent<D::Observation, D::Action> + ?Sized,
    {
        let (mut observation, info) = self.driver.reset(seed).await?;
        *last_info = info;

        while result.step_count < self.config.max_steps {
            let action = agent.act(&observation, last_info).await?;
            let transition = self.driver.step(&action).await?;

            result.step_count += 1;
            result.total_reward += transition.reward;
            result.terminated = transition.terminated;
            result.truncated = transition.truncated;
            if self.config.record_steps {
                result.steps.push(StepRecord {
                    step: result.step_count,
                    action: self.driver.action_json(&action),
                    observation: self.driver.observation_json(&transition.observation),
                    reward: transition.reward,
                    terminated: transition.terminated,
                    truncated: transition.truncated,
                    info: transition.info.clone(),
                });
            }

            let done = transition.is_done();
            observation = transition.observation;
            *last_info = transition.info;
            if done {
                return Ok(());
            }
        }

        debug!(
            target: "agentring::runner",
            episode = result.episode_number,
            max_steps = self.config.max_steps,
            "step limit reached"
        );
        Ok(())
    }
}
