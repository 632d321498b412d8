//! HTTP transport for tool-invocation servers.

mod client;
mod error;
mod multi_server;
#[cfg(test)]
pub(crate) mod test_servers;

pub(crate) use client::normalize_server_url;
pub use client::{DEFAULT_TIMEOUT, McpClient, ServerInfo};
pub use error::{TransportError, TransportErrorKind};
pub use multi_server::{MultiServerClient, MultiServerError};
