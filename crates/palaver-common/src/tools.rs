//! Tool descriptors, endpoint tool definitions and tool-call types.
//!
//! A [`ToolDescriptor`] is the caller-facing description of a capability the
//! model may request. It is a static contract (a name plus a JSON-schema shaped
//! parameter object), not a callable. [`Tool`] is the shape the chat-completion
//! endpoint expects, and the conversion between the two is lossless.

use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Describes a single property in a parameter schema.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Property {
    /// The JSON type (e.g., "string", "number", "boolean").
    #[serde(rename = "type")]
    pub prop_type: String,
    /// Human-readable description of this property.
    pub description: String,
}

impl Property {
    fn scalar(prop_type: &str, description: impl Into<String>) -> Self {
        Self {
            prop_type: prop_type.to_string(),
            description: description.into(),
        }
    }

    /// Creates a string property.
    #[must_use]
    pub fn string(description: impl Into<String>) -> Self {
        Self::scalar("string", description)
    }

    /// Creates a number property.
    #[must_use]
    pub fn number(description: impl Into<String>) -> Self {
        Self::scalar("number", description)
    }

    /// Creates an integer property.
    #[must_use]
    pub fn integer(description: impl Into<String>) -> Self {
        Self::scalar("integer", description)
    }

    /// Creates a boolean property.
    #[must_use]
    pub fn boolean(description: impl Into<String>) -> Self {
        Self::scalar("boolean", description)
    }
}

/// Typed builder for a tool's parameter object schema.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Parameters {
    /// The JSON type, always "object".
    #[serde(rename = "type")]
    pub param_type: String,
    /// Map of parameter names to their property definitions.
    pub properties: HashMap<String, Property>,
    /// List of required parameter names.
    pub required: Vec<String>,
}

impl Parameters {
    /// Creates a new `Parameters` with type "object".
    #[must_use]
    pub fn new(properties: HashMap<String, Property>, required: Vec<String>) -> Self {
        Self {
            param_type: "object".to_string(),
            properties,
            required,
        }
    }

    /// Parameters for a tool that takes no arguments.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(HashMap::new(), Vec::new())
    }
}

impl From<Parameters> for serde_json::Value {
    fn from(params: Parameters) -> Self {
        // Every field is a string, a string map or a string list, so this
        // cannot fail; log rather than silently returning Null.
        match serde_json::to_value(params) {
            Ok(value) => value,
            Err(e) => {
                warn!("Parameters serialization unexpectedly failed: {e}");
                Self::Null
            }
        }
    }
}

/// Caller-facing description of a capability the model may request.
///
/// `parameters` is an opaque JSON-schema object; it is forwarded to the
/// endpoint untouched.
///
/// ```
/// use palaver_common::tools::{Parameters, Property, ToolDescriptor};
/// use std::collections::HashMap;
///
/// let mut props = HashMap::new();
/// props.insert("city".to_string(), Property::string("City name"));
///
/// let descriptor = ToolDescriptor::builder()
///     .name("get_weather")
///     .description(Some("Look up the current weather".to_string()))
///     .parameters(Parameters::new(props, vec!["city".to_string()]).into())
///     .build();
///
/// assert_eq!(descriptor.name, "get_weather");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder, PartialEq, Eq)]
pub struct ToolDescriptor {
    /// Name the model uses to request this tool.
    #[builder(setter(into))]
    pub name: String,
    /// Optional natural-language description shown to the model.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON-schema object describing the tool's arguments.
    #[builder(default = Parameters::empty().into())]
    pub parameters: serde_json::Value,
}

impl ToolDescriptor {
    /// Creates a descriptor from a name and a parameter schema.
    pub fn new(name: impl Into<String>, parameters: impl Into<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: parameters.into(),
        }
    }

    /// Attaches a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The function half of an endpoint tool definition.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Function {
    /// The name of the function.
    pub name: String,
    /// Human-readable description of what the function does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema definition of the function's parameters.
    pub parameters: serde_json::Value,
}

/// A tool definition in the shape the chat-completion endpoint expects.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder, Eq, PartialEq)]
pub struct Tool {
    /// The type of tool (defaults to "function").
    #[serde(rename = "type")]
    #[builder(default = "function".to_string())]
    pub r#type: String,
    /// The function definition.
    pub function: Function,
}

impl From<&ToolDescriptor> for Tool {
    fn from(descriptor: &ToolDescriptor) -> Self {
        Self::builder()
            .function(Function {
                name: descriptor.name.clone(),
                description: descriptor.description.clone(),
                parameters: descriptor.parameters.clone(),
            })
            .build()
    }
}

impl From<ToolDescriptor> for Tool {
    fn from(descriptor: ToolDescriptor) -> Self {
        Self::builder()
            .function(Function {
                name: descriptor.name,
                description: descriptor.description,
                parameters: descriptor.parameters,
            })
            .build()
    }
}

/// Represents an invocation of a function with arguments.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    /// The name of the function being called.
    pub name: String,
    /// The arguments as a single JSON string, passed through as received.
    pub arguments: String,
}

impl FunctionCall {
    /// Returns the arguments as a JSON string slice.
    ///
    /// Returns `"{}"` if the arguments string is empty.
    #[must_use]
    pub fn arguments_json(&self) -> &str {
        if self.arguments.is_empty() {
            "{}"
        } else {
            &self.arguments
        }
    }

    /// Parses the arguments into `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are not valid JSON for `T`.
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(self.arguments_json())
    }
}

/// A tool-call request embedded in an assistant reply.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ToolCall {
    /// Identifier the endpoint assigned to this call; tool results echo it.
    pub id: String,
    /// The function being invoked.
    pub function: FunctionCall,
    /// The type of call, typically "function".
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
}

fn default_call_type() -> String {
    "function".to_string()
}

impl ToolCall {
    /// Creates a new tool call with an explicit ID.
    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
            call_type: default_call_type(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn test_property_wire_shape() {
        let prop = Property::number("Age in years");

        let json = serde_json::to_value(&prop).expect("Failed to serialize");
        assert_eq!(json, json!({"type": "number", "description": "Age in years"}));
    }

    #[test]
    fn test_parameters_into_value() {
        let mut properties = HashMap::new();
        properties.insert("x".to_string(), Property::integer("A number"));
        let value: serde_json::Value = Parameters::new(properties, vec!["x".to_string()]).into();

        assert_eq!(value["type"], "object");
        assert_eq!(value["properties"]["x"]["type"], "integer");
        assert_eq!(value["required"], json!(["x"]));
    }

    #[test]
    fn test_descriptor_default_parameters_are_an_empty_object_schema() {
        let descriptor = ToolDescriptor::builder().name("ping").build();

        assert_eq!(
            descriptor.parameters,
            json!({"type": "object", "properties": {}, "required": []})
        );
        assert!(descriptor.description.is_none());
    }

    #[test]
    fn test_descriptor_to_tool_is_lossless() {
        let schema = json!({
            "type": "object",
            "properties": {"city": {"type": "string", "description": "City"}},
            "required": ["city"],
            "additionalProperties": false
        });
        let descriptor =
            ToolDescriptor::new("get_weather", schema.clone()).with_description("Weather lookup");

        let tool = Tool::from(&descriptor);

        assert_eq!(tool.r#type, "function");
        assert_eq!(tool.function.name, "get_weather");
        assert_eq!(tool.function.description.as_deref(), Some("Weather lookup"));
        assert_eq!(tool.function.parameters, schema);
        assert_eq!(Tool::from(descriptor), tool);
    }

    #[test]
    fn test_tool_wire_shape() {
        let tool = Tool::from(ToolDescriptor::new("search", json!({"type": "object"})));
        let json = serde_json::to_value(&tool).unwrap();

        assert_eq!(
            json,
            json!({
                "type": "function",
                "function": {"name": "search", "parameters": {"type": "object"}}
            })
        );
    }

    #[test]
    fn test_function_call_arguments() {
        let empty = ToolCall::with_id("call_1", "no_args", "");
        assert_eq!(empty.function.arguments_json(), "{}");

        let call = ToolCall::with_id("call_2", "add", r#"{"a": 1, "b": 2}"#);
        let args: HashMap<String, i64> = call.function.parse_arguments().unwrap();
        assert_eq!(args["a"] + args["b"], 3);

        let broken = ToolCall::with_id("call_3", "add", "{");
        assert!(broken.function.parse_arguments::<serde_json::Value>().is_err());
    }

    #[test]
    fn test_tool_call_type_defaults_when_missing() {
        let call: ToolCall = serde_json::from_value(json!({
            "id": "call_9",
            "function": {"name": "f", "arguments": "{}"}
        }))
        .unwrap();

        assert_eq!(call.call_type, "function");
        assert_eq!(serde_json::to_value(&call).unwrap()["type"], "function");
    }
}
