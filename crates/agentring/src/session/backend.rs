use agentring_spaces::{Space, SpaceValue};
use async_trait::async_trait;

use super::SessionError;
use crate::env::{Info, RenderFrame, Step};

/// The operations a [`Session`](super::Session) drives, implemented once for
/// in-process environments and once for remote servers.
///
/// Backends do not track lifecycle state; the session enforces ordering
/// before delegating. Actions passed to `step` have already been checked
/// against `action_space`.
#[async_trait]
pub trait EnvBackend: Send {
    fn observation_space(&self) -> &Space;

    fn action_space(&self) -> &Space;

    fn reward_range(&self) -> (f64, f64);

    fn metadata(&self) -> &Info;

    async fn reset(
        &mut self,
        seed: Option<u64>,
        options: Option<Info>,
    ) -> Result<(SpaceValue, Info), SessionError>;

    async fn step(&mut self, action: &SpaceValue) -> Result<Step, SessionError>;

    async fn render(&mut self) -> Result<Option<RenderFrame>, SessionError>;

    /// Release backend resources. Callers treat failure as advisory.
    async fn close(&mut self) -> Result<(), SessionError>;
}
