//! Mistral Client Error Types
//!
//! Every wire-contract failure keeps the offending JSON fragment so callers can
//! diagnose a protocol mismatch between this client and the server.

use crate::api::validation::Violation;
use thiserror::Error;

/// Longest fragment rendered by `Display`; the full text stays in the variant.
const SNIPPET_LEN: usize = 500;

/// Main error type for client operations
#[derive(Debug, Error)]
pub enum MistralError {
    /// Caller misuse, e.g. empty user text
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing or malformed discriminator, or a structurally invalid object
    #[error("Malformed payload: {reason}. Fragment: {}", snippet(.fragment))]
    MalformedPayload { reason: String, fragment: String },

    /// Text that does not parse as JSON at all
    #[error("Invalid JSON: {reason}. Raw: {}", snippet(.raw))]
    InvalidJson { reason: String, raw: String },

    /// A known field holding an incompatible JSON type
    #[error("Type mismatch for '{field}': expected {expected}. Fragment: {}", snippet(.fragment))]
    TypeMismatch {
        field: String,
        expected: &'static str,
        fragment: String,
    },

    /// Discriminator value with no matching variant
    #[error("Unknown {field} '{value}'. Fragment: {}", snippet(.fragment))]
    UnknownVariant {
        field: String,
        value: String,
        fragment: String,
    },

    /// `tool_choice` that is neither a known mode string nor a function object
    #[error("Malformed tool_choice: {}", snippet(.fragment))]
    MalformedToolChoice { fragment: String },

    /// Stream source ended before the `[DONE]` sentinel
    #[error("Stream ended unexpectedly: {reason}")]
    UnexpectedStreamEnd { reason: String },

    /// Request rejected by validation before it was sent
    #[error("Request validation failed: {}", join_violations(.0))]
    Validation(Vec<Violation>),

    /// Non-success HTTP status
    #[error("API returned status {status}: {}", snippet(.body))]
    Api { status: u16, body: String },

    /// HTTP request failed
    #[error("Request failed: {0}")]
    Request(String),

    /// Timeout
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Configuration errors (unreadable file, invalid JSON, ...)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MistralError {
    /// The raw JSON text attached to a wire-contract error, if any
    pub fn fragment(&self) -> Option<&str> {
        match self {
            MistralError::MalformedPayload { fragment, .. }
            | MistralError::TypeMismatch { fragment, .. }
            | MistralError::UnknownVariant { fragment, .. }
            | MistralError::MalformedToolChoice { fragment } => Some(fragment),
            MistralError::InvalidJson { raw, .. } => Some(raw),
            MistralError::Api { body, .. } => Some(body),
            _ => None,
        }
    }
}

fn snippet(text: &str) -> &str {
    if text.len() <= SNIPPET_LEN {
        return text;
    }
    let mut end = SNIPPET_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<reqwest::Error> for MistralError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MistralError::Timeout(err.to_string())
        } else if err.is_connect() {
            MistralError::Request(format!("Connection failed: {}", err))
        } else {
            MistralError::Request(err.to_string())
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, MistralError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_respects_char_boundary() {
        let text = "é".repeat(400);
        let cut = snippet(&text);
        assert!(cut.len() <= SNIPPET_LEN);
        assert!(cut.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_fragment_kept_in_full() {
        let raw = "x".repeat(2000);
        let err = MistralError::InvalidJson {
            reason: "eof".to_string(),
            raw: raw.clone(),
        };
        assert_eq!(err.fragment(), Some(raw.as_str()));
        assert!(err.to_string().len() < 600);
    }

    #[test]
    fn test_stream_end_has_no_fragment() {
        let err = MistralError::UnexpectedStreamEnd {
            reason: "source closed".to_string(),
        };
        assert!(err.fragment().is_none());
        assert!(err.to_string().contains("source closed"));
    }
}
