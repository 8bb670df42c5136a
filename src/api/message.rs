//! Chat Messages
//!
//! Conversation messages, one variant per role.

use crate::api::content::{extract_text, ContentChunk};
use crate::api::tool::ToolCall;
use crate::error::{MistralError, Result};
use std::fmt;

/// Author role of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    /// Wire value of the `role` field
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "tool" => Some(Role::Tool),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message in a chat conversation
#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    System(SystemMessage),
    User(UserMessage),
    Assistant(AssistantMessage),
    Tool(ToolMessage),
}

/// Instructions for the model
#[derive(Debug, Clone, PartialEq)]
pub struct SystemMessage {
    pub(crate) content: Option<Vec<ContentChunk>>,
}

/// Input from the end user
#[derive(Debug, Clone, PartialEq)]
pub struct UserMessage {
    pub(crate) content: Option<Vec<ContentChunk>>,
}

/// Model output; holds content, tool calls, or both
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantMessage {
    pub(crate) content: Option<Vec<ContentChunk>>,
    pub(crate) tool_calls: Option<Vec<ToolCall>>,
    pub(crate) prefix: bool,
}

/// Result of a tool call, sent back to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolMessage {
    pub(crate) content: Option<Vec<ContentChunk>>,
    pub(crate) tool_call_id: Option<String>,
    pub(crate) name: Option<String>,
}

impl AssistantMessage {
    pub fn tool_calls(&self) -> Option<&[ToolCall]> {
        self.tool_calls.as_deref()
    }

    /// Whether the message is a prefix the model must continue
    pub fn is_prefix(&self) -> bool {
        self.prefix
    }

    pub fn set_prefix(&mut self, prefix: bool) {
        self.prefix = prefix;
    }
}

impl ToolMessage {
    pub fn tool_call_id(&self) -> Option<&str> {
        self.tool_call_id.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_tool_call_id(&mut self, tool_call_id: Option<String>) {
        self.tool_call_id = tool_call_id;
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }
}

fn single_text(text: impl Into<String>) -> Option<Vec<ContentChunk>> {
    Some(vec![ContentChunk::text(text)])
}

impl ChatMessage {
    /// System message with a single text chunk
    pub fn system(text: impl Into<String>) -> Self {
        ChatMessage::System(SystemMessage {
            content: single_text(text),
        })
    }

    /// User message with a single text chunk; empty text is rejected
    pub fn user(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(MistralError::InvalidArgument(
                "user message text content cannot be empty".to_string(),
            ));
        }
        Ok(ChatMessage::User(UserMessage {
            content: single_text(text),
        }))
    }

    /// User message from content chunks; at least one chunk is required
    pub fn user_chunks(chunks: Vec<ContentChunk>) -> Result<Self> {
        if chunks.is_empty() {
            return Err(MistralError::InvalidArgument(
                "user message needs at least one content chunk".to_string(),
            ));
        }
        Ok(ChatMessage::User(UserMessage {
            content: Some(chunks),
        }))
    }

    /// Assistant message with a single text chunk
    pub fn assistant(text: impl Into<String>) -> Self {
        ChatMessage::Assistant(AssistantMessage {
            content: single_text(text),
            tool_calls: None,
            prefix: false,
        })
    }

    /// Assistant message carrying only tool calls
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Result<Self> {
        if tool_calls.is_empty() {
            return Err(MistralError::InvalidArgument(
                "assistant tool call list cannot be empty".to_string(),
            ));
        }
        Ok(ChatMessage::Assistant(AssistantMessage {
            content: None,
            tool_calls: Some(tool_calls),
            prefix: false,
        }))
    }

    /// Assistant message with content and/or tool calls; at least one must be present
    pub fn assistant_with(
        content: Option<Vec<ContentChunk>>,
        tool_calls: Option<Vec<ToolCall>>,
    ) -> Result<Self> {
        if matches!(&tool_calls, Some(calls) if calls.is_empty()) {
            return Err(MistralError::InvalidArgument(
                "assistant tool call list cannot be empty".to_string(),
            ));
        }
        if content.is_none() && tool_calls.is_none() {
            return Err(MistralError::InvalidArgument(
                "assistant message needs content or tool calls".to_string(),
            ));
        }
        Ok(ChatMessage::Assistant(AssistantMessage {
            content,
            tool_calls,
            prefix: false,
        }))
    }

    /// Tool result with a single text chunk
    pub fn tool(text: impl Into<String>, tool_call_id: Option<String>) -> Self {
        ChatMessage::Tool(ToolMessage {
            content: single_text(text),
            tool_call_id,
            name: None,
        })
    }

    /// Tool result from content chunks; at least one chunk is required
    pub fn tool_chunks(chunks: Vec<ContentChunk>, tool_call_id: Option<String>) -> Result<Self> {
        if chunks.is_empty() {
            return Err(MistralError::InvalidArgument(
                "tool message needs at least one content chunk".to_string(),
            ));
        }
        Ok(ChatMessage::Tool(ToolMessage {
            content: Some(chunks),
            tool_call_id,
            name: None,
        }))
    }

    /// Role of this message, fixed by its variant
    pub fn role(&self) -> Role {
        match self {
            ChatMessage::System(_) => Role::System,
            ChatMessage::User(_) => Role::User,
            ChatMessage::Assistant(_) => Role::Assistant,
            ChatMessage::Tool(_) => Role::Tool,
        }
    }

    /// Content chunks; `None` when the message has no content field
    pub fn content(&self) -> Option<&[ContentChunk]> {
        match self {
            ChatMessage::System(m) => m.content.as_deref(),
            ChatMessage::User(m) => m.content.as_deref(),
            ChatMessage::Assistant(m) => m.content.as_deref(),
            ChatMessage::Tool(m) => m.content.as_deref(),
        }
    }

    /// Concatenated text of the content, `None` when there is no content field
    pub fn text_content(&self) -> Option<String> {
        self.content().map(extract_text)
    }

    pub fn as_assistant(&self) -> Option<&AssistantMessage> {
        match self {
            ChatMessage::Assistant(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_tool(&self) -> Option<&ToolMessage> {
        match self {
            ChatMessage::Tool(m) => Some(m),
            _ => None,
        }
    }

    /// Tool calls of an assistant message
    pub fn tool_calls(&self) -> Option<&[ToolCall]> {
        self.as_assistant().and_then(AssistantMessage::tool_calls)
    }
}

/// Accumulates a conversation in order
///
/// Each method appends the same message the matching `ChatMessage`
/// constructor returns. The first construction error is kept and reported by
/// [`MessageListBuilder::build`].
#[derive(Debug, Default)]
pub struct MessageListBuilder {
    messages: Vec<ChatMessage>,
    error: Option<MistralError>,
}

impl MessageListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue an existing conversation
    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            error: None,
        }
    }

    fn push(mut self, message: Result<ChatMessage>) -> Self {
        match message {
            Ok(message) => self.messages.push(message),
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(e);
                }
            }
        }
        self
    }

    pub fn system(self, text: impl Into<String>) -> Self {
        self.push(Ok(ChatMessage::system(text)))
    }

    pub fn user(self, text: impl Into<String>) -> Self {
        self.push(ChatMessage::user(text))
    }

    pub fn user_chunks(self, chunks: Vec<ContentChunk>) -> Self {
        self.push(ChatMessage::user_chunks(chunks))
    }

    pub fn assistant(self, text: impl Into<String>) -> Self {
        self.push(Ok(ChatMessage::assistant(text)))
    }

    pub fn assistant_tool_calls(self, tool_calls: Vec<ToolCall>) -> Self {
        self.push(ChatMessage::assistant_tool_calls(tool_calls))
    }

    pub fn tool(self, text: impl Into<String>, tool_call_id: Option<String>) -> Self {
        self.push(Ok(ChatMessage::tool(text, tool_call_id)))
    }

    pub fn message(self, message: ChatMessage) -> Self {
        self.push(Ok(message))
    }

    /// The assembled conversation, or the first construction error
    pub fn build(self) -> Result<Vec<ChatMessage>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.messages),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_rejects_empty_text() {
        let err = ChatMessage::user("").unwrap_err();
        assert!(matches!(err, MistralError::InvalidArgument(_)));
    }

    #[test]
    fn test_user_role() {
        let message = ChatMessage::user("Hi").unwrap();
        assert_eq!(message.role(), Role::User);
        assert_eq!(message.text_content(), Some("Hi".to_string()));
    }

    #[test]
    fn test_assistant_tool_calls_has_no_content() {
        let message =
            ChatMessage::assistant_tool_calls(vec![ToolCall::new(None, "f", "{}")]).unwrap();
        assert!(message.content().is_none());
        assert_eq!(message.text_content(), None);
        assert_eq!(message.tool_calls().unwrap().len(), 1);
    }

    #[test]
    fn test_assistant_needs_content_or_calls() {
        assert!(ChatMessage::assistant_with(None, None).is_err());
        assert!(ChatMessage::assistant_with(None, Some(vec![])).is_err());
        assert!(ChatMessage::assistant_with(Some(vec![]), None).is_ok());
        assert!(ChatMessage::assistant_tool_calls(vec![]).is_err());
    }

    #[test]
    fn test_prefix_setter() {
        let mut message = ChatMessage::assistant("Once upon");
        if let ChatMessage::Assistant(ref mut assistant) = message {
            assert!(!assistant.is_prefix());
            assistant.set_prefix(true);
        }
        assert!(message.as_assistant().unwrap().is_prefix());
    }

    #[test]
    fn test_tool_message_fields() {
        let mut message = ChatMessage::tool("22C", Some("call_1".to_string()));
        if let ChatMessage::Tool(ref mut tool) = message {
            tool.set_name(Some("get_weather".to_string()));
        }
        let tool = message.as_tool().unwrap();
        assert_eq!(tool.tool_call_id(), Some("call_1"));
        assert_eq!(tool.name(), Some("get_weather"));
        assert!(ChatMessage::tool_chunks(vec![], None).is_err());
    }

    #[test]
    fn test_builder_orders_messages() {
        let messages = MessageListBuilder::new()
            .system("Be brief")
            .user("Hello")
            .assistant("Hi")
            .tool("ok", None)
            .build()
            .unwrap();

        let roles: Vec<Role> = messages.iter().map(ChatMessage::role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Tool]
        );
        assert_eq!(messages[1], ChatMessage::user("Hello").unwrap());
    }

    #[test]
    fn test_builder_reports_first_error() {
        let result = MessageListBuilder::new()
            .system("s")
            .user("")
            .user_chunks(vec![])
            .build();
        match result {
            Err(MistralError::InvalidArgument(msg)) => assert!(msg.contains("cannot be empty")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("tool"), Some(Role::Tool));
        assert_eq!(Role::parse("narrator"), None);
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }
}
