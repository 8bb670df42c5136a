//! Request validation
//!
//! Checks a [`CompletionRequest`] against the limits the API enforces, so bad
//! requests fail locally with every problem listed instead of one HTTP 422.

use crate::api::completion::CompletionRequest;
use crate::api::message::Role;
use crate::api::tool::{ToolChoice, FUNCTION_NAME_PATTERN};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static FUNCTION_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(FUNCTION_NAME_PATTERN).unwrap());

/// One failed constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Path of the offending field, e.g. `tools[0].function.name`
    pub field: String,
    pub message: String,
}

impl Violation {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Whether `name` is an acceptable function name
pub fn is_valid_function_name(name: &str) -> bool {
    FUNCTION_NAME_RE.is_match(name)
}

/// Collect every constraint the request breaks; empty means valid
pub fn validate(request: &CompletionRequest) -> Vec<Violation> {
    let mut violations = Vec::new();

    if request.model.trim().is_empty() {
        violations.push(Violation::new("model", "must not be blank"));
    }

    if let Some(temperature) = request.temperature {
        check_range(&mut violations, "temperature", temperature, 0.0, 1.5);
    }
    check_range(&mut violations, "top_p", request.top_p, 0.0, 1.0);
    check_range(
        &mut violations,
        "presence_penalty",
        request.presence_penalty,
        -2.0,
        2.0,
    );
    check_range(
        &mut violations,
        "frequency_penalty",
        request.frequency_penalty,
        -2.0,
        2.0,
    );

    match request.messages.first() {
        None => violations.push(Violation::new("messages", "must contain at least one message")),
        Some(first) if !matches!(first.role(), Role::User | Role::System) => {
            violations.push(Violation::new(
                "messages[0].role",
                format!("must be user or system, got {}", first.role()),
            ));
        }
        Some(_) => {}
    }

    for (i, tool) in request.tools.iter().flatten().enumerate() {
        if !is_valid_function_name(&tool.function.name) {
            violations.push(Violation::new(
                format!("tools[{}].function.name", i),
                format!("'{}' does not match {}", tool.function.name, FUNCTION_NAME_PATTERN),
            ));
        }
    }

    if let ToolChoice::Specific { function_name } = &request.tool_choice {
        if !is_valid_function_name(function_name) {
            violations.push(Violation::new(
                "tool_choice.function.name",
                format!("'{}' does not match {}", function_name, FUNCTION_NAME_PATTERN),
            ));
        }
    }

    violations
}

fn check_range(violations: &mut Vec<Violation>, field: &str, value: f64, min: f64, max: f64) {
    // NaN fails both comparisons, so test containment rather than exclusion
    if !(min..=max).contains(&value) {
        violations.push(Violation::new(
            field,
            format!("must be between {} and {}, got {}", min, max, value),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::message::ChatMessage;
    use crate::api::tool::{Function, Tool};

    fn request() -> CompletionRequest {
        CompletionRequest::new(
            "mistral-small-latest",
            vec![ChatMessage::user("Hello").unwrap()],
        )
    }

    fn fields(violations: &[Violation]) -> Vec<&str> {
        violations.iter().map(|v| v.field.as_str()).collect()
    }

    #[test]
    fn test_valid_request() {
        assert!(validate(&request()).is_empty());

        let req = CompletionRequest::new(
            "m",
            vec![
                ChatMessage::system("Be brief"),
                ChatMessage::user("Hi").unwrap(),
            ],
        )
        .with_temperature(1.5)
        .with_top_p(0.0)
        .with_penalties(-2.0, 2.0);
        assert!(validate(&req).is_empty());
    }

    #[test]
    fn test_blank_model_and_no_messages() {
        let req = CompletionRequest::new("  ", Vec::new());
        assert_eq!(fields(&validate(&req)), vec!["model", "messages"]);
    }

    #[test]
    fn test_out_of_range_sampling() {
        let req = request()
            .with_temperature(1.6)
            .with_top_p(1.01)
            .with_penalties(2.5, f64::NAN);
        assert_eq!(
            fields(&validate(&req)),
            vec!["temperature", "top_p", "presence_penalty", "frequency_penalty"]
        );
    }

    #[test]
    fn test_first_message_role() {
        let req = CompletionRequest::new("m", vec![ChatMessage::assistant("hi")]);
        let violations = validate(&req);
        assert_eq!(fields(&violations), vec!["messages[0].role"]);
        assert_eq!(
            violations[0].to_string(),
            "messages[0].role: must be user or system, got assistant"
        );
    }

    #[test]
    fn test_function_names() {
        assert!(is_valid_function_name("get_weather-v2"));
        assert!(!is_valid_function_name(""));
        assert!(!is_valid_function_name("get weather"));
        assert!(!is_valid_function_name(&"x".repeat(65)));

        let tools = vec![
            Tool::new(Function::new("ok_name", "{}").unwrap()),
            Tool::new(Function::new("bad.name", "{}").unwrap()),
        ];
        let req = request().with_tools(tools, ToolChoice::specific("also bad"));
        assert_eq!(
            fields(&validate(&req)),
            vec!["tools[1].function.name", "tool_choice.function.name"]
        );
    }
}
