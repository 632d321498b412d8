//! Converters from [`ToolDescriptor`] to the tool formats agent SDKs consume.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value, json};

use super::descriptor::ToolDescriptor;
use super::error::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolFormat {
    /// `{"type": "function", "function": {name, description, parameters}}`
    OpenAi,
    /// Same envelope as [`ToolFormat::OpenAi`], kept under its generic name.
    JsonSchema,
    /// Bare `{name, description, parameters}`.
    FunctionSpec,
    /// An OpenAPI operation object with one query parameter per property.
    OpenApi,
}

impl ToolFormat {
    pub const ALL: [ToolFormat; 4] = [
        ToolFormat::OpenAi,
        ToolFormat::JsonSchema,
        ToolFormat::FunctionSpec,
        ToolFormat::OpenApi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolFormat::OpenAi => "openai",
            ToolFormat::JsonSchema => "json_schema",
            ToolFormat::FunctionSpec => "function_spec",
            ToolFormat::OpenApi => "openapi",
        }
    }
}

impl fmt::Display for ToolFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolFormat {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ToolFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == wanted)
            .ok_or_else(|| ToolError::UnknownFormat {
                name: s.to_string(),
                available: ToolFormat::ALL
                    .iter()
                    .map(ToolFormat::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

impl ToolDescriptor {
    pub fn to_openai_tool(&self) -> Value {
        json!({
            "type": "function",
            "function": self.to_function_spec(),
        })
    }

    pub fn to_function_spec(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters,
        })
    }

    pub fn to_openapi_operation(&self) -> Value {
        let required = self.required_parameters();
        let parameters: Vec<Value> = self
            .properties()
            .into_iter()
            .flatten()
            .map(|(name, schema)| {
                json!({
                    "name": name,
                    "in": "query",
                    "description": schema.get("description").and_then(Value::as_str).unwrap_or(""),
                    "required": required.contains(&name.as_str()),
                    "schema": openapi_schema(schema),
                })
            })
            .collect();

        json!({
            "summary": self.description,
            "operationId": self.name,
            "parameters": parameters,
            "responses": {
                "200": {
                    "description": "Successful tool execution",
                    "content": {
                        "application/json": {
                            "schema": {
                                "type": "object",
                                "properties": {
                                    "success": {"type": "boolean"},
                                    "result": {"type": "object"},
                                    "error": {"type": "string"}
                                }
                            }
                        }
                    }
                }
            }
        })
    }
}

pub fn convert_tool_format(descriptor: &ToolDescriptor, format: ToolFormat) -> Value {
    match format {
        ToolFormat::OpenAi | ToolFormat::JsonSchema => descriptor.to_openai_tool(),
        ToolFormat::FunctionSpec => descriptor.to_function_spec(),
        ToolFormat::OpenApi => descriptor.to_openapi_operation(),
    }
}

/// Narrow a JSON schema fragment to the subset OpenAPI parameter schemas use.
/// Anything without a recognised `type` degrades to a string.
fn openapi_schema(schema: &Value) -> Value {
    let copy = |out: &mut Map<String, Value>, keys: &[&str]| {
        for key in keys {
            if let Some(v) = schema.get(*key) {
                out.insert((*key).to_string(), v.clone());
            }
        }
    };

    let kind = schema.get("type").and_then(Value::as_str).unwrap_or("string");
    let mut out = Map::new();
    match kind {
        "string" => {
            out.insert("type".into(), json!("string"));
            copy(&mut out, &["enum", "minLength", "maxLength"]);
        }
        "integer" | "number" => {
            out.insert("type".into(), json!(kind));
            copy(&mut out, &["minimum", "maximum"]);
        }
        "boolean" => {
            out.insert("type".into(), json!("boolean"));
        }
        "array" => {
            out.insert("type".into(), json!("array"));
            if let Some(items) = schema.get("items") {
                out.insert("items".into(), openapi_schema(items));
            }
        }
        "object" => {
            out.insert("type".into(), json!("object"));
            if let Some(props) = schema.get("properties").and_then(Value::as_object) {
                out.insert(
                    "properties".into(),
                    Value::Object(
                        props
                            .iter()
                            .map(|(k, v)| (k.clone(), openapi_schema(v)))
                            .collect(),
                    ),
                );
            }
            copy(&mut out, &["required"]);
        }
        _ => {
            out.insert("type".into(), json!("string"));
        }
    }
    Value::Object(out)
}
