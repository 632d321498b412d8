//! Drive gym-style environments through one session contract, whether the
//! simulator runs in-process or behind a remote tool server.

pub mod config;
pub mod env;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod runner;
pub mod session;
pub mod tools;

pub use agentring_spaces as spaces;
pub use agentring_spaces::{Space, SpaceError, SpaceValue};
pub use config::{Mode, SessionConfig};
pub use env::{EnvRegistry, Environment, Info, RenderFrame, Step};
pub use error::{Error, Result};
pub use mcp::{McpClient, TransportError};
pub use runner::{EpisodeResults, EpisodeRunner};
pub use session::{Session, SessionError, SessionState};
pub use tools::{McpTool, ToolFactory, create_tools};
