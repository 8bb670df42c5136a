//! Chat Completion API
//!
//! Request and response types for the chat completion endpoint.

use crate::api::codec::{
    encode_list, serde_via_wire, type_mismatch, unknown_variant, Fields, ObjectWriter, Wire,
};
use crate::api::message::ChatMessage;
use crate::api::tool::{Tool, ToolCall, ToolChoice};
use crate::error::{MistralError, Result};
use serde_json::{json, Value};

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ModelLength,
    Error,
    ToolCalls,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ModelLength => "model_length",
            FinishReason::Error => "error",
            FinishReason::ToolCalls => "tool_calls",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "stop" => Some(FinishReason::Stop),
            "length" => Some(FinishReason::Length),
            "model_length" => Some(FinishReason::ModelLength),
            "error" => Some(FinishReason::Error),
            "tool_calls" => Some(FinishReason::ToolCalls),
            _ => None,
        }
    }
}

impl Wire for FinishReason {
    fn encode(&self) -> Value {
        Value::from(self.as_str())
    }

    fn decode(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => {
                FinishReason::parse(s).ok_or_else(|| unknown_variant("finish_reason", s, value))
            }
            other => Err(type_mismatch("finish_reason", "string", other)),
        }
    }
}

/// Output format kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseFormatType {
    #[default]
    Text,
    JsonObject,
    JsonSchema,
}

impl ResponseFormatType {
    fn as_str(&self) -> &'static str {
        match self {
            ResponseFormatType::Text => "text",
            ResponseFormatType::JsonObject => "json_object",
            ResponseFormatType::JsonSchema => "json_schema",
        }
    }
}

/// Named JSON schema for structured output
#[derive(Debug, Clone, PartialEq)]
pub struct JsonSchema {
    pub name: String,
    pub description: Option<String>,
    pub strict: bool,
    schema: String,
    schema_value: Value,
}

impl JsonSchema {
    /// Wrap a raw JSON schema; the text must parse as JSON
    pub fn new(name: impl Into<String>, schema_json: impl Into<String>) -> Result<Self> {
        let schema = schema_json.into();
        let schema_value = serde_json::from_str(&schema).map_err(|e| MistralError::InvalidJson {
            reason: format!("json schema: {}", e),
            raw: schema.clone(),
        })?;

        Ok(Self {
            name: name.into(),
            description: None,
            strict: false,
            schema,
            schema_value,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// The schema exactly as supplied
    pub fn schema_json(&self) -> &str {
        &self.schema
    }
}

impl Wire for JsonSchema {
    fn encode(&self) -> Value {
        ObjectWriter::new()
            .field("name", self.name.as_str())
            .opt("description", self.description.as_deref())
            .field("schema", self.schema_value.clone())
            .field("strict", self.strict)
            .build()
    }

    fn decode(value: &Value) -> Result<Self> {
        let fields = Fields::of(value, "json_schema")?;
        let schema_value = fields
            .get("schema")
            .cloned()
            .ok_or_else(|| MistralError::MalformedPayload {
                reason: "missing field 'schema'".to_string(),
                fragment: value.to_string(),
            })?;

        Ok(Self {
            name: fields.string("name")?,
            description: fields.opt_string("description")?,
            strict: fields.opt_bool("strict")?.unwrap_or(false),
            schema: schema_value.to_string(),
            schema_value,
        })
    }
}

/// Requested output format
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseFormat {
    pub format_type: ResponseFormatType,
    pub json_schema: Option<JsonSchema>,
}

impl ResponseFormat {
    pub fn text() -> Self {
        Self::default()
    }

    pub fn json_object() -> Self {
        Self {
            format_type: ResponseFormatType::JsonObject,
            json_schema: None,
        }
    }

    pub fn json_schema(schema: JsonSchema) -> Self {
        Self {
            format_type: ResponseFormatType::JsonSchema,
            json_schema: Some(schema),
        }
    }
}

impl Wire for ResponseFormat {
    fn encode(&self) -> Value {
        ObjectWriter::new()
            .field("type", self.format_type.as_str())
            .opt("json_schema", self.json_schema.as_ref().map(Wire::encode))
            .build()
    }

    fn decode(value: &Value) -> Result<Self> {
        let fields = Fields::of(value, "response_format")?;
        let format_type = match fields.discriminator("type")? {
            "text" => ResponseFormatType::Text,
            "json_object" => ResponseFormatType::JsonObject,
            "json_schema" => ResponseFormatType::JsonSchema,
            other => return Err(unknown_variant("response_format type", other, value)),
        };

        Ok(Self {
            format_type,
            json_schema: fields.opt_decode("json_schema")?,
        })
    }
}

/// Expected completion, used to speed up generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prediction {
    pub content: String,
}

impl Wire for Prediction {
    fn encode(&self) -> Value {
        json!({ "type": "content", "content": self.content })
    }

    fn decode(value: &Value) -> Result<Self> {
        let fields = Fields::of(value, "prediction")?;
        match fields.opt_str("type")? {
            None | Some("content") => {}
            Some(other) => return Err(unknown_variant("prediction type", other, value)),
        }
        Ok(Self {
            content: fields.opt_string("content")?.unwrap_or_default(),
        })
    }
}

/// Chat completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,

    /// Messages in the conversation
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature
    pub temperature: Option<f64>,

    /// Nucleus sampling mass
    pub top_p: f64,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,

    /// Stream the response as server-sent events
    pub stream: bool,

    /// Stop sequences
    pub stop: Vec<String>,

    /// Seed for deterministic sampling
    pub random_seed: Option<u64>,

    /// Output format
    pub response_format: ResponseFormat,

    /// Prepend the provider's safety prompt
    pub safe_prompt: bool,

    /// Tool definitions
    pub tools: Option<Vec<Tool>>,

    /// Tool choice
    pub tool_choice: ToolChoice,

    pub presence_penalty: f64,

    pub frequency_penalty: f64,

    /// Number of completions to generate
    pub n: Option<u32>,

    /// Predicted output
    pub prediction: Option<Prediction>,

    /// Allow several tool calls in one turn
    pub parallel_tool_calls: bool,
}

impl CompletionRequest {
    /// Create a new completion request
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            top_p: 1.0,
            max_tokens: None,
            stream: false,
            stop: Vec::new(),
            random_seed: None,
            response_format: ResponseFormat::default(),
            safe_prompt: false,
            tools: None,
            tool_choice: ToolChoice::Auto,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            n: None,
            prediction: None,
            parallel_tool_calls: true,
        }
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Enable streaming
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn with_response_format(mut self, response_format: ResponseFormat) -> Self {
        self.response_format = response_format;
        self
    }

    pub fn with_safe_prompt(mut self, safe_prompt: bool) -> Self {
        self.safe_prompt = safe_prompt;
        self
    }

    /// Declare tools and how the model should choose among them
    pub fn with_tools(mut self, tools: Vec<Tool>, tool_choice: ToolChoice) -> Self {
        self.tools = Some(tools);
        self.tool_choice = tool_choice;
        self
    }

    pub fn with_penalties(mut self, presence: f64, frequency: f64) -> Self {
        self.presence_penalty = presence;
        self.frequency_penalty = frequency;
        self
    }

    pub fn with_n(mut self, n: u32) -> Self {
        self.n = Some(n);
        self
    }

    pub fn with_prediction(mut self, content: impl Into<String>) -> Self {
        self.prediction = Some(Prediction {
            content: content.into(),
        });
        self
    }

    pub fn with_parallel_tool_calls(mut self, parallel: bool) -> Self {
        self.parallel_tool_calls = parallel;
        self
    }
}

impl Wire for CompletionRequest {
    fn encode(&self) -> Value {
        ObjectWriter::new()
            .field("model", self.model.as_str())
            .opt("temperature", self.temperature)
            .field("top_p", self.top_p)
            .opt("max_tokens", self.max_tokens)
            .field("stream", self.stream)
            .field("stop", self.stop.clone())
            .opt("random_seed", self.random_seed)
            .list("messages", &self.messages)
            .field("response_format", self.response_format.encode())
            .field("safe_prompt", self.safe_prompt)
            .opt_list("tools", self.tools.as_deref())
            .field("tool_choice", self.tool_choice.encode())
            .field("presence_penalty", self.presence_penalty)
            .field("frequency_penalty", self.frequency_penalty)
            .opt("n", self.n)
            .opt("prediction", self.prediction.as_ref().map(Wire::encode))
            .field("parallel_tool_calls", self.parallel_tool_calls)
            .build()
    }

    fn decode(value: &Value) -> Result<Self> {
        let fields = Fields::of(value, "request")?;
        let mut request = CompletionRequest::new(fields.string("model")?, fields.list("messages")?);

        request.temperature = fields.opt_f64("temperature")?;
        request.max_tokens = fields.opt_u32("max_tokens")?;
        request.random_seed = fields.opt_u64("random_seed")?;
        request.n = fields.opt_u32("n")?;
        request.tools = fields.opt_list("tools")?;
        request.prediction = fields.opt_decode("prediction")?;

        if let Some(top_p) = fields.opt_f64("top_p")? {
            request.top_p = top_p;
        }
        if let Some(stream) = fields.opt_bool("stream")? {
            request.stream = stream;
        }
        if let Some(stop) = fields.string_list("stop")? {
            request.stop = stop;
        }
        if let Some(format) = fields.opt_decode("response_format")? {
            request.response_format = format;
        }
        if let Some(safe_prompt) = fields.opt_bool("safe_prompt")? {
            request.safe_prompt = safe_prompt;
        }
        if let Some(tool_choice) = fields.opt_decode("tool_choice")? {
            request.tool_choice = tool_choice;
        }
        if let Some(penalty) = fields.opt_f64("presence_penalty")? {
            request.presence_penalty = penalty;
        }
        if let Some(penalty) = fields.opt_f64("frequency_penalty")? {
            request.frequency_penalty = penalty;
        }
        if let Some(parallel) = fields.opt_bool("parallel_tool_calls")? {
            request.parallel_tool_calls = parallel;
        }

        Ok(request)
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Wire for Usage {
    fn encode(&self) -> Value {
        json!({
            "prompt_tokens": self.prompt_tokens,
            "completion_tokens": self.completion_tokens,
            "total_tokens": self.total_tokens,
        })
    }

    fn decode(value: &Value) -> Result<Self> {
        let fields = Fields::of(value, "usage")?;
        Ok(Self {
            prompt_tokens: fields.opt_u32("prompt_tokens")?.unwrap_or(0),
            completion_tokens: fields.opt_u32("completion_tokens")?.unwrap_or(0),
            total_tokens: fields.opt_u32("total_tokens")?.unwrap_or(0),
        })
    }
}

/// A choice in the completion response
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: Option<FinishReason>,
}

impl Wire for Choice {
    fn encode(&self) -> Value {
        ObjectWriter::new()
            .field("index", self.index)
            .field("message", self.message.encode())
            .opt("finish_reason", self.finish_reason.as_ref().map(Wire::encode))
            .build()
    }

    fn decode(value: &Value) -> Result<Self> {
        let fields = Fields::of(value, "choice")?;
        let message = fields
            .opt_decode("message")?
            .ok_or_else(|| MistralError::MalformedPayload {
                reason: "choice without message".to_string(),
                fragment: value.to_string(),
            })?;

        Ok(Self {
            index: fields.opt_u32("index")?.unwrap_or(0),
            message,
            finish_reason: fields.opt_decode("finish_reason")?,
        })
    }
}

/// Chat completion response
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

impl CompletionResponse {
    /// Text of the first choice
    pub fn content(&self) -> Option<String> {
        self.choices.first().and_then(|c| c.message.text_content())
    }

    /// Tool calls from the first choice
    pub fn tool_calls(&self) -> Option<&[ToolCall]> {
        self.choices.first().and_then(|c| c.message.tool_calls())
    }
}

impl Wire for CompletionResponse {
    fn encode(&self) -> Value {
        ObjectWriter::new()
            .field("id", self.id.as_str())
            .field("object", self.object.as_str())
            .field("created", self.created)
            .field("model", self.model.as_str())
            .field("choices", encode_list(&self.choices))
            .opt("usage", self.usage.as_ref().map(Wire::encode))
            .build()
    }

    fn decode(value: &Value) -> Result<Self> {
        let fields = Fields::of(value, "completion response")?;
        Ok(Self {
            id: fields.string("id")?,
            object: fields.opt_string("object")?.unwrap_or_default(),
            created: fields.opt_u64("created")?.unwrap_or(0),
            model: fields.string("model")?,
            choices: fields.list("choices")?,
            usage: fields.opt_decode("usage")?,
        })
    }
}

serde_via_wire!(CompletionRequest, CompletionResponse, Usage, FinishReason);
