use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use jsonschema::JSONSchema;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::descriptor::ToolDescriptor;
use super::error::ToolError;
use super::set::ToolSet;
use crate::mcp::McpClient;

/// A callable synthesized from a [`ToolDescriptor`].
///
/// Arguments are validated against the descriptor before any request is
/// sent. Tools share their server connection, so clones and sibling tools may
/// be invoked concurrently.
#[derive(Clone)]
pub struct McpTool {
    descriptor: ToolDescriptor,
    client: Arc<McpClient>,
    validators: Arc<BTreeMap<String, JSONSchema>>,
}

impl fmt::Debug for McpTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpTool")
            .field("name", &self.descriptor.name)
            .field("server", &self.client.server_url())
            .finish_non_exhaustive()
    }
}

impl McpTool {
    pub fn new(descriptor: ToolDescriptor, client: Arc<McpClient>) -> Self {
        let mut validators = BTreeMap::new();
        for (name, schema) in descriptor.properties().into_iter().flatten() {
            match JSONSchema::compile(schema) {
                Ok(compiled) => {
                    validators.insert(name.clone(), compiled);
                }
                Err(e) => warn!(
                    target: "agentring::tools",
                    tool = %descriptor.name,
                    parameter = %name,
                    error = %e,
                    "parameter schema does not compile; values will not be type-checked"
                ),
            }
        }
        Self {
            descriptor,
            client,
            validators: Arc::new(validators),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn description(&self) -> &str {
        &self.descriptor.description
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    pub fn server_url(&self) -> &str {
        self.client.server_url()
    }

    /// Check `args` against the parameter schema without calling the server.
    pub fn validate(&self, args: &Map<String, Value>) -> Result<(), ToolError> {
        let tool = self.name();

        if let Some(missing) = self
            .descriptor
            .required_parameters()
            .into_iter()
            .find(|name| !args.contains_key(*name))
        {
            return Err(ToolError::invalid_argument(
                tool,
                missing,
                "missing required parameter",
            ));
        }

        if !self.descriptor.accepts_unknown_parameters()
            && let Some(unknown) = args
                .keys()
                .find(|name| self.descriptor.parameter(name).is_none())
        {
            return Err(ToolError::invalid_argument(
                tool,
                unknown,
                format!(
                    "unknown parameter (expected one of: {})",
                    self.descriptor.parameter_names().join(", ")
                ),
            ));
        }

        for (name, value) in args {
            let Some(validator) = self.validators.get(name) else {
                continue;
            };
            if let Err(mut errors) = validator.validate(value) {
                let message = errors
                    .next()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "value does not match the parameter schema".to_string());
                return Err(ToolError::invalid_argument(tool, name, message));
            }
        }

        Ok(())
    }

    /// Validate, invoke and unwrap the tool's result.
    ///
    /// Returns `result` when the body carries one, `data` for successful
    /// bodies that carry it, and the whole body otherwise. A body with
    /// `"success": false` becomes [`ToolError::ToolFailed`].
    pub async fn call(&self, args: Map<String, Value>) -> Result<Value, ToolError> {
        self.validate(&args)?;
        debug!(target: "agentring::tools", tool = %self.name(), "calling tool");

        let body = self
            .client
            .call_tool(self.name(), args)
            .await
            .map_err(|source| ToolError::Transport {
                tool: self.name().to_string(),
                source,
            })?;

        if body.get("success") == Some(&Value::Bool(false)) {
            return Err(ToolError::ToolFailed {
                tool: self.name().to_string(),
                message: failure_message(&body),
            });
        }
        Ok(format_result(body))
    }

    /// [`McpTool::call`] with arguments taken from any value that serializes
    /// to a JSON object.
    pub async fn call_with<T: Serialize + ?Sized>(&self, args: &T) -> Result<Value, ToolError> {
        match serde_json::to_value(args) {
            Ok(Value::Object(map)) => self.call(map).await,
            Ok(Value::Null) => self.call(Map::new()).await,
            Ok(other) => Err(ToolError::invalid_argument(
                self.name(),
                "<arguments>",
                format!("arguments must serialize to an object, got {other}"),
            )),
            Err(e) => Err(ToolError::invalid_argument(
                self.name(),
                "<arguments>",
                e.to_string(),
            )),
        }
    }
}

pub(crate) fn failure_message(body: &Value) -> String {
    match body.get("error") {
        Some(Value::String(message)) => message.clone(),
        Some(Value::Null) | None => "no error detail provided".to_string(),
        Some(other) => other.to_string(),
    }
}

fn format_result(mut body: Value) -> Value {
    if let Some(result) = body.get_mut("result") {
        return result.take();
    }
    if body.get("success") == Some(&Value::Bool(true))
        && let Some(data) = body.get_mut("data")
    {
        return data.take();
    }
    body
}

/// Builds [`McpTool`]s from whatever a server advertises.
#[derive(Debug, Clone)]
pub struct ToolFactory {
    client: Arc<McpClient>,
}

impl ToolFactory {
    pub fn new(server_url: &str) -> Result<Self, ToolError> {
        let client = McpClient::new(server_url).map_err(|source| ToolError::Discovery {
            server: server_url.to_string(),
            source,
        })?;
        Ok(Self::with_client(Arc::new(client)))
    }

    pub fn with_client(client: Arc<McpClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<McpClient> {
        &self.client
    }

    pub async fn tool_definitions(&self) -> Result<&[ToolDescriptor], ToolError> {
        self.client
            .discover_tools()
            .await
            .map_err(|source| ToolError::Discovery {
                server: self.client.server_url().to_string(),
                source,
            })
    }

    pub async fn tool_names(&self) -> Result<Vec<String>, ToolError> {
        Ok(self
            .tool_definitions()
            .await?
            .iter()
            .map(|tool| tool.name.clone())
            .collect())
    }

    /// All advertised tools in server order, or exactly `names` in the order
    /// given. Any requested name the server does not advertise is an error.
    pub async fn create_tools(&self, names: Option<&[&str]>) -> Result<ToolSet, ToolError> {
        let definitions = self.tool_definitions().await?;

        let selected: Vec<&ToolDescriptor> = match names {
            None => definitions.iter().collect(),
            Some(names) => names
                .iter()
                .map(|name| {
                    definitions
                        .iter()
                        .find(|tool| tool.name == *name)
                        .ok_or_else(|| {
                            ToolError::unknown_tool(
                                name,
                                definitions.iter().map(|tool| tool.name.as_str()),
                            )
                        })
                })
                .collect::<Result<_, _>>()?,
        };

        Ok(selected
            .into_iter()
            .map(|descriptor| McpTool::new(descriptor.clone(), Arc::clone(&self.client)))
            .collect())
    }

    pub async fn create_tool(&self, name: &str) -> Result<McpTool, ToolError> {
        let mut tools = self.create_tools(Some(&[name])).await?;
        tools
            .take(name)
            .ok_or_else(|| ToolError::unknown_tool(name, std::iter::empty()))
    }
}

/// Discover `server_url` and synthesize its tools; see [`ToolFactory::create_tools`].
pub async fn create_tools(server_url: &str, names: Option<&[&str]>) -> Result<ToolSet, ToolError> {
    ToolFactory::new(server_url)?.create_tools(names).await
}
