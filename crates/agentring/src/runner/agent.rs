use std::future::Future;

use async_trait::async_trait;
use thiserror::Error;

use crate::env::Info;

/// A policy failure reported by the agent itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("agent failed: {0}")]
pub struct AgentError(pub String);

impl AgentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Produces one action per observation.
///
/// The runner awaits each `act` call to completion before issuing the next
/// environment step, so implementations never see overlapping calls.
///
/// Plain closures `FnMut(&O) -> A` are agents; wrap async closures with
/// [`async_agent`].
#[async_trait]
pub trait Agent<O: Sync, A: Send>: Send {
    async fn act(&mut self, observation: &O, info: &Info) -> Result<A, AgentError>;
}

#[async_trait]
impl<O, A, F> Agent<O, A> for F
where
    O: Sync,
    A: Send,
    F: FnMut(&O) -> A + Send,
{
    async fn act(&mut self, observation: &O, _info: &Info) -> Result<A, AgentError> {
        Ok(self(observation))
    }
}

/// Adapts an async closure taking an owned observation.
#[derive(Debug, Clone)]
pub struct AsyncFnAgent<F>(F);

pub fn async_agent<F>(f: F) -> AsyncFnAgent<F> {
    AsyncFnAgent(f)
}

#[async_trait]
impl<O, A, F, Fut> Agent<O, A> for AsyncFnAgent<F>
where
    O: Clone + Send + Sync + 'static,
    A: Send + 'static,
    F: FnMut(O) -> Fut + Send,
    Fut: Future<Output = A> + Send + 'static,
{
    async fn act(&mut self, observation: &O, _info: &Info) -> Result<A, AgentError> {
        Ok((self.0)(observation.clone()).await)
    }
}
