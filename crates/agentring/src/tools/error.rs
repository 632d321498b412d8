use thiserror::Error;

use crate::mcp::TransportError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("unknown tool '{name}' (available: {available})")]
    UnknownTool { name: String, available: String },

    #[error("invalid argument '{parameter}' for tool '{tool}': {message}")]
    InvalidArgument {
        tool: String,
        parameter: String,
        message: String,
    },

    #[error("failed to discover tools from {server}: {source}")]
    Discovery {
        server: String,
        #[source]
        source: TransportError,
    },

    #[error("tool '{tool}' failed: {source}")]
    Transport {
        tool: String,
        #[source]
        source: TransportError,
    },

    #[error("tool '{tool}' reported failure: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("unsupported tool format '{name}' (available: {available})")]
    UnknownFormat { name: String, available: String },
}

impl ToolError {
    pub fn unknown_tool<'a>(name: &str, available: impl IntoIterator<Item = &'a str>) -> Self {
        let available: Vec<&str> = available.into_iter().collect();
        ToolError::UnknownTool {
            name: name.to_string(),
            available: if available.is_empty() {
                "none".to_string()
            } else {
                available.join(", ")
            },
        }
    }

    pub fn invalid_argument(tool: &str, parameter: &str, message: impl Into<String>) -> Self {
        ToolError::InvalidArgument {
            tool: tool.to_string(),
            parameter: parameter.to_string(),
            message: message.into(),
        }
    }
}
