//! Schema-driven tools synthesized from a server's discovery endpoint.

mod descriptor;
mod error;
mod factory;
mod formats;
mod set;

pub use descriptor::ToolDescriptor;
pub use error::ToolError;
pub use factory::{McpTool, ToolFactory, create_tools};
pub(crate) use factory::failure_message;
pub use formats::{ToolFormat, convert_tool_format};
pub use set::{NamedTool, ToolFilter, ToolSet, compose_tools, filter_tools};
