//! API Module
//!
//! Conversation model, wire codec, streaming decoder and request types.

pub mod codec;
pub mod completion;
pub mod content;
pub mod message;
pub mod models;
pub mod streaming;
pub mod tool;
pub mod validation;

pub use codec::Wire;
pub use completion::{
    Choice, CompletionRequest, CompletionResponse, FinishReason, JsonSchema, Prediction,
    ResponseFormat, ResponseFormatType, Usage,
};
pub use content::{extract_text, ContentChunk, ReferenceIds};
pub use message::{ChatMessage, MessageListBuilder, Role};
pub use models::{
    EmbeddingRequest, EmbeddingResponse, FloatEmbedding, ListModelsResponse, Model,
    ModelCapabilities,
};
pub use streaming::{
    decode_stream, drive, run_lines, DecoderState, StreamAccumulator, StreamCallback,
    StreamChunk, StreamDecoder, StreamEvent,
};
pub use tool::{Function, Tool, ToolCall, ToolChoice};
pub use validation::{validate, Violation};
