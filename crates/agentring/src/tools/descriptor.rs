use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// A tool as advertised by a server's discovery endpoint.
///
/// `parameters` is the server's JSON schema for the argument object and is
/// never rewritten by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
}

pub(crate) fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            server_url: None,
        }
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Declared parameters, or `None` when the schema does not enumerate them.
    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.parameters.get("properties").and_then(Value::as_object)
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.properties().and_then(|props| props.get(name))
    }

    pub fn parameter_names(&self) -> Vec<&str> {
        self.properties()
            .map(|props| props.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn required_parameters(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required_parameters().contains(&name)
    }

    /// Whether argument names outside the declared properties are accepted.
    ///
    /// A schema without a `properties` object places no constraint on names;
    /// otherwise extra names are rejected unless `additionalProperties` is
    /// explicitly truthy.
    pub fn accepts_unknown_parameters(&self) -> bool {
        if self.properties().is_none() {
            return true;
        }
        match self.parameters.get("additionalProperties") {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Object(_)) => true,
            _ => false,
        }
    }
}
