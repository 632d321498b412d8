use agentring_spaces::SpaceError;
use thiserror::Error;

use super::SessionState;
use crate::config::ConfigError;
use crate::env::EnvError;
use crate::mcp::TransportError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Space(#[from] SpaceError),

    #[error("cannot {operation} a session that is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("{operation} failed: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: BackendFailure,
    },

    #[error("{0} is not supported by this environment")]
    UnsupportedOperation(&'static str),
}

/// What went wrong inside a backend call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("server reported failure: {0}")]
    Rejected(String),

    #[error("malformed result: {0}")]
    Malformed(String),

    #[error(transparent)]
    Environment(EnvError),
}

impl SessionError {
    pub(crate) fn backend(operation: &'static str, source: impl Into<BackendFailure>) -> Self {
        SessionError::Backend {
            operation,
            source: source.into(),
        }
    }

    /// Map a local environment error, keeping schema and capability errors
    /// in their own variants.
    pub(crate) fn from_env(operation: &'static str, err: EnvError) -> Self {
        match err {
            EnvError::Space(e) => SessionError::Space(e),
            EnvError::Unsupported(what) => SessionError::UnsupportedOperation(what),
            other => SessionError::backend(operation, BackendFailure::Environment(other)),
        }
    }
}

impl From<ConfigError> for SessionError {
    fn from(err: ConfigError) -> Self {
        SessionError::Configuration(err.to_string())
    }
}
