//! Wire Codec
//!
//! Two-way mapping between the typed conversation model and its JSON wire
//! format. Field names are snake_case on the wire.
//!
//! Three kinds of polymorphism are resolved here:
//! - tagged unions keyed by a discriminator field (`role` on messages, `type`
//!   on content chunks), dispatched through an explicit match;
//! - the `content` field, which decodes from either a bare string or a list of
//!   chunk objects but always encodes as the list;
//! - `tool_choice`, which is either a mode string or a function object.

use crate::api::content::{ContentChunk, ReferenceIds};
use crate::api::message::{
    AssistantMessage, ChatMessage, Role, SystemMessage, ToolMessage, UserMessage,
};
use crate::api::tool::{Function, Tool, ToolCall, ToolChoice};
use crate::error::{MistralError, Result};
use serde_json::{json, Map, Value};

/// A type with a JSON wire representation
pub trait Wire: Sized {
    /// Encode into the canonical wire shape
    fn encode(&self) -> Value;

    /// Decode from any accepted wire shape
    fn decode(value: &Value) -> Result<Self>;
}

/// Parse JSON text, keeping the whole text on failure
pub fn parse_json(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| MistralError::InvalidJson {
        reason: e.to_string(),
        raw: text.to_string(),
    })
}

/// Decode a wire type from JSON text
pub fn decode<T: Wire>(json: &str) -> Result<T> {
    T::decode(&parse_json(json)?)
}

/// Encode a wire type to JSON text
pub fn encode<T: Wire>(value: &T) -> String {
    value.encode().to_string()
}

/// Read access to the fields of one JSON object
///
/// Errors name the field and carry the offending fragment. A `null` value is
/// treated the same as an absent field.
#[derive(Clone, Copy)]
pub(crate) struct Fields<'a> {
    map: &'a Map<String, Value>,
    source: &'a Value,
}

impl<'a> Fields<'a> {
    pub(crate) fn of(value: &'a Value, what: &str) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self { map, source: value }),
            other => Err(type_mismatch(what, "object", other)),
        }
    }

    pub(crate) fn source(&self) -> &'a Value {
        self.source
    }

    pub(crate) fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    fn missing(&self, key: &str) -> MistralError {
        MistralError::MalformedPayload {
            reason: format!("missing field '{}'", key),
            fragment: self.source.to_string(),
        }
    }

    /// Discriminator value; absent or non-string is a malformed payload
    pub(crate) fn discriminator(&self, key: &str) -> Result<&'a str> {
        match self.get(key) {
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(MistralError::MalformedPayload {
                reason: format!("discriminator '{}' is not a string", key),
                fragment: self.source.to_string(),
            }),
            None => Err(MistralError::MalformedPayload {
                reason: format!("missing discriminator '{}'", key),
                fragment: self.source.to_string(),
            }),
        }
    }

    pub(crate) fn opt_str(&self, key: &str) -> Result<Option<&'a str>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(type_mismatch(key, "string", other)),
        }
    }

    pub(crate) fn str(&self, key: &str) -> Result<&'a str> {
        self.opt_str(key)?.ok_or_else(|| self.missing(key))
    }

    pub(crate) fn opt_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.opt_str(key)?.map(str::to_string))
    }

    pub(crate) fn string(&self, key: &str) -> Result<String> {
        Ok(self.str(key)?.to_string())
    }

    pub(crate) fn opt_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(type_mismatch(key, "boolean", other)),
        }
    }

    pub(crate) fn opt_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| type_mismatch(key, "number", v)),
        }
    }

    pub(crate) fn opt_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_u64()
                .map(Some)
                .ok_or_else(|| type_mismatch(key, "non-negative integer", v)),
        }
    }

    pub(crate) fn opt_u32(&self, key: &str) -> Result<Option<u32>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| type_mismatch(key, "32-bit non-negative integer", v)),
        }
    }

    pub(crate) fn opt_array(&self, key: &str) -> Result<Option<&'a Vec<Value>>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(other) => Err(type_mismatch(key, "array", other)),
        }
    }

    pub(crate) fn opt_object(&self, key: &str) -> Result<Option<Fields<'a>>> {
        self.get(key).map(|v| Fields::of(v, key)).transpose()
    }

    pub(crate) fn object(&self, key: &str) -> Result<Fields<'a>> {
        self.opt_object(key)?.ok_or_else(|| self.missing(key))
    }

    pub(crate) fn opt_decode<T: Wire>(&self, key: &str) -> Result<Option<T>> {
        self.get(key).map(T::decode).transpose()
    }

    pub(crate) fn opt_list<T: Wire>(&self, key: &str) -> Result<Option<Vec<T>>> {
        self.opt_array(key)?
            .map(|items| items.iter().map(T::decode).collect::<Result<Vec<T>>>())
            .transpose()
    }

    pub(crate) fn list<T: Wire>(&self, key: &str) -> Result<Vec<T>> {
        self.opt_list(key)?.ok_or_else(|| self.missing(key))
    }

    pub(crate) fn string_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        self.opt_array(key)?
            .map(|items| {
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s.clone()),
                        other => Err(type_mismatch(key, "array of strings", other)),
                    })
                    .collect::<Result<Vec<String>>>()
            })
            .transpose()
    }

    /// The shape-polymorphic `content` field
    ///
    /// A bare string becomes one `Text` chunk, an array is decoded chunk by
    /// chunk, and an absent field stays absent.
    pub(crate) fn content(&self) -> Result<Option<Vec<ContentChunk>>> {
        match self.get("content") {
            None => Ok(None),
            Some(Value::String(text)) => Ok(Some(vec![ContentChunk::text(text.as_str())])),
            Some(Value::Array(items)) => items
                .iter()
                .map(ContentChunk::decode)
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(other) => Err(type_mismatch(
                "content",
                "string or array of content chunks",
                other,
            )),
        }
    }
}

pub(crate) fn type_mismatch(field: &str, expected: &'static str, found: &Value) -> MistralError {
    MistralError::TypeMismatch {
        field: field.to_string(),
        expected,
        fragment: found.to_string(),
    }
}

pub(crate) fn unknown_variant(field: &str, value: &str, source: &Value) -> MistralError {
    MistralError::UnknownVariant {
        field: field.to_string(),
        value: value.to_string(),
        fragment: source.to_string(),
    }
}

/// Builder for an encoded JSON object that skips absent optional fields
#[derive(Default)]
pub(crate) struct ObjectWriter(Map<String, Value>);

impl ObjectWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub(crate) fn opt(self, key: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => self.field(key, v),
            None => self,
        }
    }

    pub(crate) fn list<T: Wire>(self, key: &str, items: &[T]) -> Self {
        self.field(key, encode_list(items))
    }

    pub(crate) fn opt_list<T: Wire>(self, key: &str, items: Option<&[T]>) -> Self {
        match items {
            Some(items) => self.list(key, items),
            None => self,
        }
    }

    pub(crate) fn build(self) -> Value {
        Value::Object(self.0)
    }
}

pub(crate) fn encode_list<T: Wire>(items: &[T]) -> Value {
    Value::Array(items.iter().map(Wire::encode).collect())
}

// =============================================================================
// Content chunks
// =============================================================================

impl Wire for ContentChunk {
    fn encode(&self) -> Value {
        let writer = ObjectWriter::new().field("type", self.kind());
        let writer = match self {
            ContentChunk::Text { text } => writer.field("text", text.as_str()),
            ContentChunk::ImageRef { uri, detail } => writer.field(
                "image_url",
                ObjectWriter::new()
                    .field("url", uri.as_str())
                    .opt("detail", detail.as_deref())
                    .build(),
            ),
            ContentChunk::DocumentRef { uri, name } => writer
                .field("document_url", uri.as_str())
                .opt("document_name", name.as_deref()),
            ContentChunk::Reference { ids } => writer.field("reference_ids", ids.as_slice()),
        };
        writer.build()
    }

    fn decode(value: &Value) -> Result<Self> {
        let fields = Fields::of(value, "content chunk")?;

        match fields.discriminator("type")? {
            "text" => Ok(ContentChunk::Text {
                text: fields.string("text")?,
            }),
            "image_url" => {
                let image = fields.object("image_url")?;
                Ok(ContentChunk::ImageRef {
                    uri: image.string("url")?,
                    detail: image.opt_string("detail")?,
                })
            }
            "document_url" => Ok(ContentChunk::DocumentRef {
                uri: fields.string("document_url")?,
                name: fields.opt_string("document_name")?,
            }),
            "reference" => {
                let raw_ids = fields
                    .opt_array("reference_ids")?
                    .ok_or_else(|| fields.missing("reference_ids"))?;
                let ids = raw_ids
                    .iter()
                    .map(|id| {
                        id.as_i64()
                            .ok_or_else(|| type_mismatch("reference_ids", "array of integers", id))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let ids = ReferenceIds::new(ids).map_err(|_| MistralError::MalformedPayload {
                    reason: "reference chunk with no reference_ids".to_string(),
                    fragment: value.to_string(),
                })?;
                Ok(ContentChunk::Reference { ids })
            }
            other => Err(unknown_variant("content chunk type", other, value)),
        }
    }
}

// =============================================================================
// Messages
// =============================================================================

fn content_value(content: Option<&[ContentChunk]>) -> Option<Value> {
    content.map(encode_list)
}

impl Wire for ChatMessage {
    fn encode(&self) -> Value {
        let writer = ObjectWriter::new()
            .field("role", self.role().as_str())
            .opt("content", content_value(self.content()));

        let writer = match self {
            ChatMessage::System(_) | ChatMessage::User(_) => writer,
            ChatMessage::Assistant(m) => {
                let writer = writer.opt_list("tool_calls", m.tool_calls.as_deref());
                if m.prefix {
                    writer.field("prefix", true)
                } else {
                    writer
                }
            }
            ChatMessage::Tool(m) => writer
                .opt("tool_call_id", m.tool_call_id.as_deref())
                .opt("name", m.name.as_deref()),
        };
        writer.build()
    }

    fn decode(value: &Value) -> Result<Self> {
        let fields = Fields::of(value, "message")?;
        let role = fields.discriminator("role")?;
        let content = fields.content()?;

        match Role::parse(role) {
            Some(Role::System) => Ok(ChatMessage::System(SystemMessage { content })),
            Some(Role::User) => Ok(ChatMessage::User(UserMessage { content })),
            Some(Role::Assistant) => {
                let tool_calls: Option<Vec<ToolCall>> = fields.opt_list("tool_calls")?;
                if content.is_none() && tool_calls.is_none() {
                    return Err(MistralError::MalformedPayload {
                        reason: "assistant message has neither content nor tool_calls"
                            .to_string(),
                        fragment: value.to_string(),
                    });
                }
                Ok(ChatMessage::Assistant(AssistantMessage {
                    content,
                    tool_calls,
                    prefix: fields.opt_bool("prefix")?.unwrap_or(false),
                }))
            }
            Some(Role::Tool) => Ok(ChatMessage::Tool(ToolMessage {
                content,
                tool_call_id: fields.opt_string("tool_call_id")?,
                name: fields.opt_string("name")?,
            })),
            None => Err(unknown_variant("role", role, value)),
        }
    }
}

impl Wire for Role {
    fn encode(&self) -> Value {
        Value::from(self.as_str())
    }

    fn decode(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Role::parse(s).ok_or_else(|| unknown_variant("role", s, value)),
            other => Err(type_mismatch("role", "string", other)),
        }
    }
}

// =============================================================================
// Tools
// =============================================================================

pub(crate) fn check_tool_type(fields: &Fields<'_>) -> Result<()> {
    match fields.opt_str("type")? {
        None | Some(Tool::TYPE) => Ok(()),
        Some(other) => Err(unknown_variant("tool type", other, fields.source())),
    }
}

impl Wire for ToolCall {
    fn encode(&self) -> Value {
        ObjectWriter::new()
            .opt("id", self.id.as_deref())
            .field("type", Tool::TYPE)
            .field(
                "function",
                json!({
                    "name": self.function_name,
                    "arguments": self.arguments_json,
                }),
            )
            .field("index", self.index)
            .build()
    }

    fn decode(value: &Value) -> Result<Self> {
        let fields = Fields::of(value, "tool call")?;
        check_tool_type(&fields)?;
        let function = fields.object("function")?;

        Ok(ToolCall {
            id: fields.opt_string("id")?,
            function_name: function.string("name")?,
            arguments_json: function.string("arguments")?,
            index: fields.opt_u32("index")?.unwrap_or(0),
        })
    }
}

impl Wire for Function {
    fn encode(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters_value(),
            "strict": self.strict,
        })
    }

    fn decode(value: &Value) -> Result<Self> {
        let fields = Fields::of(value, "function")?;
        let parameters = fields
            .get("parameters")
            .cloned()
            .ok_or_else(|| fields.missing("parameters"))?;

        let mut function = Function::from_schema_value(fields.string("name")?, parameters);
        function.description = fields.opt_string("description")?.unwrap_or_default();
        function.strict = fields.opt_bool("strict")?.unwrap_or(false);
        Ok(function)
    }
}

impl Wire for Tool {
    fn encode(&self) -> Value {
        json!({
            "type": Tool::TYPE,
            "function": self.function.encode(),
        })
    }

    fn decode(value: &Value) -> Result<Self> {
        let fields = Fields::of(value, "tool")?;
        check_tool_type(&fields)?;
        let function = fields
            .get("function")
            .ok_or_else(|| fields.missing("function"))?;
        Ok(Tool {
            function: Function::decode(function)?,
        })
    }
}

impl Wire for ToolChoice {
    fn encode(&self) -> Value {
        match self {
            ToolChoice::Specific { function_name } => json!({
                "type": Tool::TYPE,
                "function": { "name": function_name },
            }),
            mode => Value::from(mode.mode().unwrap_or("auto")),
        }
    }

    fn decode(value: &Value) -> Result<Self> {
        let malformed = || MistralError::MalformedToolChoice {
            fragment: value.to_string(),
        };

        match value {
            Value::String(mode) => ToolChoice::from_mode(mode).ok_or_else(malformed),
            Value::Object(map) => {
                match map.get("type") {
                    None | Some(Value::Null) => {}
                    Some(Value::String(t)) if t == Tool::TYPE => {}
                    Some(_) => return Err(malformed()),
                }
                map.get("function")
                    .and_then(|f| f.get("name"))
                    .and_then(Value::as_str)
                    .map(ToolChoice::specific)
                    .ok_or_else(malformed)
            }
            _ => Err(malformed()),
        }
    }
}

// =============================================================================
// serde bridge
// =============================================================================

/// Implement serde traits for wire types by routing through [`Wire`]
macro_rules! serde_via_wire {
    ($($ty:ty),* $(,)?) => {$(
        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serde::Serialize::serialize(&$crate::api::codec::Wire::encode(self), serializer)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let value = <serde_json::Value as serde::Deserialize>::deserialize(deserializer)?;
                <$ty as $crate::api::codec::Wire>::decode(&value).map_err(serde::de::Error::custom)
            }
        }
    )*};
}

pub(crate) use serde_via_wire;

serde_via_wire!(ContentChunk, ChatMessage, Role, ToolCall, Function, Tool, ToolChoice);
