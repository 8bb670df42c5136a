//! Tool Invocation Types
//!
//! Function declarations, tool-choice directives and the tool calls an
//! assistant makes.

use crate::error::{MistralError, Result};
use serde_json::Value;

/// Pattern every function name must match: letters, digits, underscores and
/// dashes, 1 to 64 characters.
pub const FUNCTION_NAME_PATTERN: &str = "^[a-zA-Z0-9_-]{1,64}$";

/// A function the model may call
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Function name, see [`FUNCTION_NAME_PATTERN`]
    pub name: String,

    /// Description shown to the model
    pub description: String,

    /// Enforce the parameter schema strictly
    pub strict: bool,

    /// Parameter JSON schema as supplied by the caller
    parameters: String,

    /// Parsed form of `parameters`, emitted verbatim on the wire
    parameters_value: Value,
}

impl Function {
    /// Declare a function with a raw JSON schema for its parameters
    pub fn new(name: impl Into<String>, parameters_json: impl Into<String>) -> Result<Self> {
        let parameters = parameters_json.into();
        let parameters_value = serde_json::from_str(&parameters).map_err(|e| {
            MistralError::InvalidJson {
                reason: format!("function parameters: {}", e),
                raw: parameters.clone(),
            }
        })?;

        Ok(Self {
            name: name.into(),
            description: String::new(),
            strict: false,
            parameters,
            parameters_value,
        })
    }

    pub(crate) fn from_schema_value(name: String, parameters_value: Value) -> Self {
        Self {
            name,
            description: String::new(),
            strict: false,
            parameters: parameters_value.to_string(),
            parameters_value,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set strict schema adherence
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// The parameter schema exactly as supplied
    pub fn parameters_json(&self) -> &str {
        &self.parameters
    }

    pub(crate) fn parameters_value(&self) -> &Value {
        &self.parameters_value
    }
}

/// A tool declaration; the only tool type is `function`
#[derive(Debug, Clone, PartialEq)]
pub struct Tool {
    pub function: Function,
}

impl Tool {
    pub const TYPE: &'static str = "function";

    pub fn new(function: Function) -> Self {
        Self { function }
    }
}

/// A call the assistant made to one of the declared tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    /// Call id, echoed back in the tool message answering it
    pub id: Option<String>,

    /// Name of the called function
    pub function_name: String,

    /// Arguments as JSON text, passed through unparsed
    pub arguments_json: String,

    /// Position among the calls of one message
    pub index: u32,
}

impl ToolCall {
    pub fn new(
        id: Option<String>,
        function_name: impl Into<String>,
        arguments_json: impl Into<String>,
    ) -> Self {
        Self {
            id,
            function_name: function_name.into(),
            arguments_json: arguments_json.into(),
            index: 0,
        }
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }
}

/// How the model should pick tools
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Any,
    Required,

    /// Force a call to one named function
    Specific { function_name: String },
}

impl ToolChoice {
    pub fn specific(function_name: impl Into<String>) -> Self {
        ToolChoice::Specific {
            function_name: function_name.into(),
        }
    }

    /// Lowercase wire string for the mode variants
    pub fn mode(&self) -> Option<&'static str> {
        match self {
            ToolChoice::Auto => Some("auto"),
            ToolChoice::None => Some("none"),
            ToolChoice::Any => Some("any"),
            ToolChoice::Required => Some("required"),
            ToolChoice::Specific { .. } => None,
        }
    }

    /// Parse a mode string, ignoring case
    pub fn from_mode(mode: &str) -> Option<Self> {
        match mode.to_uppercase().as_str() {
            "AUTO" => Some(ToolChoice::Auto),
            "NONE" => Some(ToolChoice::None),
            "ANY" => Some(ToolChoice::Any),
            "REQUIRED" => Some(ToolChoice::Required),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_keeps_raw_schema() {
        let raw = r#"{"type":"object","properties":{"city":{"type":"string"}}}"#;
        let function = Function::new("get_weather", raw)
            .unwrap()
            .with_description("Current weather");

        assert_eq!(function.parameters_json(), raw);
        assert_eq!(function.parameters_value()["type"], "object");
        assert_eq!(function.description, "Current weather");
        assert!(!function.strict);
    }

    #[test]
    fn test_function_rejects_invalid_schema() {
        let err = Function::new("f", "{not json").unwrap_err();
        assert!(matches!(err, MistralError::InvalidJson { ref raw, .. } if raw == "{not json"));
    }

    #[test]
    fn test_tool_choice_modes() {
        assert_eq!(ToolChoice::from_mode("auto"), Some(ToolChoice::Auto));
        assert_eq!(ToolChoice::from_mode("Required"), Some(ToolChoice::Required));
        assert_eq!(ToolChoice::from_mode("ANY"), Some(ToolChoice::Any));
        assert_eq!(ToolChoice::from_mode("bogus"), None);
        assert_eq!(ToolChoice::None.mode(), Some("none"));
        assert_eq!(ToolChoice::specific("f").mode(), None);
    }

    #[test]
    fn test_tool_call_defaults_to_index_zero() {
        let call = ToolCall::new(Some("c1".to_string()), "f", "{}");
        assert_eq!(call.index, 0);
        assert_eq!(call.with_index(2).index, 2);
    }
}
