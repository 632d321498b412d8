use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum SpaceError {
    #[error("schema mismatch at {path}: {message}")]
    SchemaMismatch { path: String, message: String },

    #[error("unsupported space type '{tag}' at {path}")]
    UnsupportedSpace { tag: String, path: String },

    #[error("invalid space descriptor at {path}: {message}")]
    InvalidDescriptor { path: String, message: String },
}

impl SpaceError {
    pub fn mismatch<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        SpaceError::SchemaMismatch {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        SpaceError::InvalidDescriptor {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Location of the offending value or descriptor, e.g. `observation.velocity[0]`.
    pub fn path(&self) -> &str {
        match self {
            SpaceError::SchemaMismatch { path, .. }
            | SpaceError::UnsupportedSpace { path, .. }
            | SpaceError::InvalidDescriptor { path, .. } => path,
        }
    }
}

pub type Result<T> = std::result::Result<T, SpaceError>;

pub(crate) fn key_path(parent: &str, key: &str) -> String {
    format!("{parent}.{key}")
}

pub(crate) fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}
