use agentring_spaces::SpaceError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::env::EnvError;
use crate::mcp::{MultiServerError, TransportError};
use crate::runner::ResultsError;
use crate::session::SessionError;
use crate::tools::ToolError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Space(#[from] SpaceError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    MultiServer(#[from] MultiServerError),
    #[error(transparent)]
    Environment(#[from] EnvError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Results(#[from] ResultsError),
}
