use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single exchange with a tool server.
///
/// Every variant names the URL involved. The underlying `reqwest` error is
/// flattened to text so nothing above the transport depends on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("cannot reach {url}: {message}")]
    Connection { url: String, message: String },

    #[error("request to {url} timed out after {timeout_ms} ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("malformed response from {url}: {message}")]
    MalformedResponse { url: String, message: String },

    #[error("invalid server URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    Connection,
    Timeout,
    ServerFailure,
    Protocol,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => f.write_str("connection"),
            Self::Timeout => f.write_str("timeout"),
            Self::ServerFailure => f.write_str("server_failure"),
            Self::Protocol => f.write_str("protocol"),
        }
    }
}

const MAX_BODY_CHARS: usize = 512;

impl TransportError {
    pub fn kind(&self) -> TransportErrorKind {
        match self {
            Self::Connection { .. } | Self::InvalidUrl { .. } => TransportErrorKind::Connection,
            Self::Timeout { .. } => TransportErrorKind::Timeout,
            Self::Status { .. } => TransportErrorKind::ServerFailure,
            Self::MalformedResponse { .. } => TransportErrorKind::Protocol,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Connection { url, .. }
            | Self::Timeout { url, .. }
            | Self::Status { url, .. }
            | Self::MalformedResponse { url, .. }
            | Self::InvalidUrl { url, .. } => url,
        }
    }

    pub(crate) fn from_reqwest(url: &str, timeout: Duration, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else if err.is_decode() {
            Self::MalformedResponse {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            Self::Connection {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    pub(crate) fn status(url: &str, status: u16, body: &str) -> Self {
        let mut body: String = body.chars().take(MAX_BODY_CHARS).collect();
        if body.is_empty() {
            body.push_str("<empty body>");
        }
        Self::Status {
            url: url.to_string(),
            status,
            body,
        }
    }

    pub(crate) fn malformed(url: &str, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            url: url.to_string(),
            message: message.into(),
        }
    }
}
