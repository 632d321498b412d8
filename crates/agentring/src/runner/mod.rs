//! Repeated reset/step cycles against a session or raw tools, and the
//! statistics collected from them.

mod agent;
mod driver;
mod episode;
mod results;

pub use agent::{Agent, AgentError, AsyncFnAgent, async_agent};
pub use driver::{EpisodeDriver, EpisodeError, ToolDriver, Transition};
pub use episode::{DEFAULT_MAX_STEPS, EpisodeRunner, RunnerConfig, SuccessCriterion};
pub use results::{EpisodeResult, EpisodeResults, ResultSummary, ResultsError, StepRecord};
