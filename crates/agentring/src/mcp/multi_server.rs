use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use super::client::McpClient;
use super::error::TransportError;
use crate::tools::{ToolError, ToolFactory, ToolSet};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MultiServerError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("call to server '{server}' failed: {source}")]
    Transport {
        server: String,
        #[source]
        source: TransportError,
    },
}

/// Several named tool servers treated as one pool of tools.
///
/// Servers keep their registration order, which is also the order of
/// [`MultiServerClient::all_tools`].
#[derive(Debug, Default)]
pub struct MultiServerClient {
    servers: Vec<(String, Arc<McpClient>)>,
}

impl MultiServerClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_server(&mut self, name: &str, client: McpClient) -> Result<(), MultiServerError> {
        if self.contains(name) {
            return Err(MultiServerError::Configuration(format!(
                "server '{name}' is already registered"
            )));
        }
        debug!(target: "agentring::mcp", server = name, url = client.server_url(), "registered server");
        self.servers.push((name.to_string(), Arc::new(client)));
        Ok(())
    }

    pub fn add_server_url(&mut self, name: &str, url: &str) -> Result<(), MultiServerError> {
        let client = McpClient::new(url)
            .map_err(|e| MultiServerError::Configuration(format!("server '{name}': {e}")))?;
        self.add_server(name, client)
    }

    pub fn remove_server(&mut self, name: &str) -> Result<Arc<McpClient>, MultiServerError> {
        let index = self
            .servers
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| unknown_server(name))?;
        Ok(self.servers.remove(index).1)
    }

    pub fn server(&self, name: &str) -> Result<&Arc<McpClient>, MultiServerError> {
        self.servers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, client)| client)
            .ok_or_else(|| unknown_server(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.servers.iter().any(|(n, _)| n == name)
    }

    pub fn server_names(&self) -> Vec<&str> {
        self.servers.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub async fn tools(&self, server: &str) -> Result<ToolSet, MultiServerError> {
        let client = self.server(server)?;
        Ok(ToolFactory::with_client(Arc::clone(client))
            .create_tools(None)
            .await?)
    }

    /// Every tool of every server, concatenated in registration order.
    pub async fn all_tools(&self) -> Result<ToolSet, MultiServerError> {
        let mut all = Vec::new();
        for (name, _) in &self.servers {
            all.extend(self.tools(name).await?);
        }
        Ok(ToolSet::new(all))
    }

    /// The first registered server advertising `tool`.
    pub async fn server_for_tool(&self, tool: &str) -> Result<Option<&str>, MultiServerError> {
        for (name, client) in &self.servers {
            let advertised = client.discover_tools().await.map_err(|source| {
                MultiServerError::Tool(ToolError::Discovery {
                    server: client.server_url().to_string(),
                    source,
                })
            })?;
            if advertised.iter().any(|t| t.name == tool) {
                return Ok(Some(name));
            }
        }
        Ok(None)
    }

    pub async fn call_tool_on(
        &self,
        server: &str,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, MultiServerError> {
        self.server(server)?
            .call_tool(tool, arguments)
            .await
            .map_err(|source| MultiServerError::Transport {
                server: server.to_string(),
                source,
            })
    }

    pub async fn health_check_all(&self) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();
        for (name, client) in &self.servers {
            results.insert(name.clone(), client.health_check().await);
        }
        results
    }

    pub async fn healthy_servers(&self) -> Vec<&str> {
        let mut healthy = Vec::new();
        for (name, client) in &self.servers {
            if client.health_check().await {
                healthy.push(name.as_str());
            }
        }
        healthy
    }
}

fn unknown_server(name: &str) -> MultiServerError {
    MultiServerError::Configuration(format!("server '{name}' is not registered"))
}
