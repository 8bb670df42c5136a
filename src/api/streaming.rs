//! Streaming Support
//!
//! Decodes Server-Sent Events (SSE) chat completion streams. Lines starting
//! with `data: ` carry one JSON delta each; the payload `[DONE]` ends the
//! stream. Deltas are folded into a [`StreamAccumulator`] that yields the final
//! assistant message.

use crate::api::codec::{self, serde_via_wire, Fields, ObjectWriter, Wire};
use crate::api::completion::{FinishReason, Usage};
use crate::api::content::{extract_text, ContentChunk};
use crate::api::message::{AssistantMessage, ChatMessage, Role};
use crate::api::tool::ToolCall;
use crate::error::{MistralError, Result};
use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Prefix marking an event frame line
pub const DATA_PREFIX: &str = "data: ";

/// Payload that ends a successful stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// A streaming chunk from the API
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamChunk {
    pub id: Option<String>,
    pub object: Option<String>,
    pub created: Option<u64>,
    pub model: Option<String>,

    /// Choices with deltas
    pub choices: Vec<DeltaChoice>,

    /// Usage info (only in final chunk)
    pub usage: Option<Usage>,
}

impl StreamChunk {
    /// Text carried by all deltas of this chunk
    pub fn text(&self) -> String {
        self.choices
            .iter()
            .filter_map(|c| c.delta.content.as_deref())
            .map(extract_text)
            .collect()
    }
}

/// A choice in a streaming chunk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaChoice {
    pub index: u32,

    /// The delta (partial message)
    pub delta: DeltaMessage,

    /// Finish reason (set in final delta of a choice)
    pub finish_reason: Option<FinishReason>,
}

/// Partial message carried by one delta
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaMessage {
    /// Role (usually only in first chunk)
    pub role: Option<Role>,

    pub content: Option<Vec<ContentChunk>>,

    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Fragment of a tool call, keyed by `index`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallDelta {
    pub index: u32,

    /// Tool call ID (only in first fragment for this call)
    pub id: Option<String>,

    /// Function name (only in first fragment)
    pub function_name: Option<String>,

    /// Slice of the arguments JSON text
    pub arguments: Option<String>,
}

impl Wire for ToolCallDelta {
    fn encode(&self) -> Value {
        ObjectWriter::new()
            .field("index", self.index)
            .opt("id", self.id.as_deref())
            .field(
                "function",
                ObjectWriter::new()
                    .opt("name", self.function_name.as_deref())
                    .opt("arguments", self.arguments.as_deref())
                    .build(),
            )
            .build()
    }

    fn decode(value: &Value) -> Result<Self> {
        let fields = Fields::of(value, "tool call delta")?;
        codec::check_tool_type(&fields)?;
        let function = fields.opt_object("function")?;

        Ok(Self {
            index: fields.opt_u32("index")?.unwrap_or(0),
            id: fields.opt_string("id")?,
            function_name: function.map(|f| f.opt_string("name")).transpose()?.flatten(),
            arguments: function.map(|f| f.opt_string("arguments")).transpose()?.flatten(),
        })
    }
}

impl Wire for DeltaMessage {
    fn encode(&self) -> Value {
        ObjectWriter::new()
            .opt("role", self.role.map(|r| r.as_str()))
            .opt_list("content", self.content.as_deref())
            .opt_list("tool_calls", self.tool_calls.as_deref())
            .build()
    }

    fn decode(value: &Value) -> Result<Self> {
        let fields = Fields::of(value, "delta")?;
        Ok(Self {
            role: fields.opt_decode("role")?,
            content: fields.content()?,
            tool_calls: fields.opt_list("tool_calls")?,
        })
    }
}

impl Wire for DeltaChoice {
    fn encode(&self) -> Value {
        ObjectWriter::new()
            .field("index", self.index)
            .field("delta", self.delta.encode())
            .opt("finish_reason", self.finish_reason.map(|r| r.as_str()))
            .build()
    }

    fn decode(value: &Value) -> Result<Self> {
        let fields = Fields::of(value, "choice")?;
        Ok(Self {
            index: fields.opt_u32("index")?.unwrap_or(0),
            delta: fields.opt_decode("delta")?.unwrap_or_default(),
            finish_reason: fields.opt_decode("finish_reason")?,
        })
    }
}

impl Wire for StreamChunk {
    fn encode(&self) -> Value {
        ObjectWriter::new()
            .opt("id", self.id.as_deref())
            .opt("object", self.object.as_deref())
            .opt("created", self.created)
            .opt("model", self.model.as_deref())
            .list("choices", &self.choices)
            .opt("usage", self.usage.as_ref().map(Wire::encode))
            .build()
    }

    fn decode(value: &Value) -> Result<Self> {
        let fields = Fields::of(value, "stream chunk")?;
        Ok(Self {
            id: fields.opt_string("id")?,
            object: fields.opt_string("object")?,
            created: fields.opt_u64("created")?,
            model: fields.opt_string("model")?,
            choices: fields.opt_list("choices")?.unwrap_or_default(),
            usage: fields.opt_decode("usage")?,
        })
    }
}

serde_via_wire!(StreamChunk);

/// In-progress message for one choice index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaAccumulator {
    role: Option<Role>,
    content: Vec<ContentChunk>,
    tool_calls: BTreeMap<u32, ToolCall>,
    finish_reason: Option<FinishReason>,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one delta into the message
    pub fn apply(&mut self, choice: &DeltaChoice) {
        let delta = &choice.delta;

        // First role wins
        if self.role.is_none() {
            self.role = delta.role;
        }

        if let Some(content) = &delta.content {
            self.content.extend(content.iter().cloned());
        }

        for fragment in delta.tool_calls.iter().flatten() {
            match self.tool_calls.get_mut(&fragment.index) {
                Some(call) => {
                    if let Some(args) = &fragment.arguments {
                        call.arguments_json.push_str(args);
                    }
                }
                None => {
                    let call = ToolCall {
                        id: fragment.id.clone(),
                        function_name: fragment.function_name.clone().unwrap_or_default(),
                        arguments_json: fragment.arguments.clone().unwrap_or_default(),
                        index: fragment.index,
                    };
                    self.tool_calls.insert(fragment.index, call);
                }
            }
        }

        if choice.finish_reason.is_some() {
            self.finish_reason = choice.finish_reason;
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Content chunks in arrival order
    pub fn content(&self) -> &[ContentChunk] {
        &self.content
    }

    /// Concatenated text received so far
    pub fn text(&self) -> String {
        extract_text(&self.content)
    }

    /// Tool calls ordered by index
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.tool_calls.values()
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    /// Convert to the final assistant message
    pub fn into_message(self) -> ChatMessage {
        let tool_calls: Vec<ToolCall> = self.tool_calls.into_values().collect();
        let (content, tool_calls) = if tool_calls.is_empty() {
            (Some(self.content), None)
        } else if self.content.is_empty() {
            (None, Some(tool_calls))
        } else {
            (Some(self.content), Some(tool_calls))
        };

        ChatMessage::Assistant(AssistantMessage {
            content,
            tool_calls,
            prefix: false,
        })
    }
}

/// Accumulator for a whole stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamAccumulator {
    /// Response ID
    pub id: Option<String>,

    /// Model name
    pub model: Option<String>,

    /// Created timestamp
    pub created: Option<u64>,

    /// Usage from final chunk
    pub usage: Option<Usage>,

    choices: BTreeMap<u32, DeltaAccumulator>,
}

impl StreamAccumulator {
    /// Create a new accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a streaming chunk
    pub fn process_chunk(&mut self, chunk: &StreamChunk) {
        // Store metadata from first chunk that carries it
        if self.id.is_none() {
            self.id = chunk.id.clone();
        }
        if self.model.is_none() {
            self.model = chunk.model.clone();
        }
        if self.created.is_none() {
            self.created = chunk.created;
        }
        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }

        for choice in &chunk.choices {
            self.choices.entry(choice.index).or_default().apply(choice);
        }
    }

    /// In-progress message of one choice
    pub fn choice(&self, index: u32) -> Option<&DeltaAccumulator> {
        self.choices.get(&index)
    }

    /// Role of the first choice
    pub fn role(&self) -> Option<Role> {
        self.choice(0).and_then(DeltaAccumulator::role)
    }

    /// Text of the first choice
    pub fn text(&self) -> String {
        self.choice(0).map(DeltaAccumulator::text).unwrap_or_default()
    }

    /// Convert the first choice to a final message
    pub fn into_message(mut self) -> ChatMessage {
        self.choices.remove(&0).unwrap_or_default().into_message()
    }

    /// Convert every choice, ordered by index
    pub fn into_messages(self) -> Vec<(u32, ChatMessage)> {
        self.choices
            .into_iter()
            .map(|(index, acc)| (index, acc.into_message()))
            .collect()
    }
}

/// Splits a byte stream into text lines
///
/// Bytes are held until a `\n` arrives, so frames and multi-byte characters
/// split across network reads are reassembled before decoding.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    /// Prefix of `pending` already known to hold no newline
    scanned: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and return every line they complete
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        let mut search_from = self.scanned;
        while let Some(i) = self.pending[search_from..].iter().position(|&b| b == b'\n') {
            let end = search_from + i;
            lines.push(decode_line(&self.pending[start..end]));
            start = end + 1;
            search_from = start;
        }

        self.pending.drain(..start);
        self.scanned = self.pending.len();
        lines
    }

    /// Take the unterminated tail left when the source ends
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        self.scanned = 0;
        Some(decode_line(&rest))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Lifecycle of one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    AwaitingFirstDelta,
    Accumulating,
    Completed,
    Failed,
}

impl DecoderState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DecoderState::Completed | DecoderState::Failed)
    }
}

/// What a single line amounted to
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Not an event frame, or the stream is already finished
    Ignored,

    /// A decoded delta event
    Chunk(StreamChunk),

    /// The end-of-stream sentinel
    Done,
}

/// Incremental decoder for one stream
///
/// Owns its accumulator; a decoder is never reused across streams. Once
/// `Completed` or `Failed`, further input is ignored.
#[derive(Debug)]
pub struct StreamDecoder {
    state: DecoderState,
    accumulator: StreamAccumulator,
    frames: usize,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::AwaitingFirstDelta,
            accumulator: StreamAccumulator::new(),
            frames: 0,
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn accumulator(&self) -> &StreamAccumulator {
        &self.accumulator
    }

    /// Take the accumulated state, leaving an empty one behind
    pub fn take_accumulator(&mut self) -> StreamAccumulator {
        std::mem::take(&mut self.accumulator)
    }

    /// Parse one line of the event source
    ///
    /// A returned chunk is not yet accumulated; pass it to
    /// [`StreamDecoder::accumulate`] after notifying the consumer.
    pub fn feed_line(&mut self, line: &str) -> Result<Frame> {
        if self.state.is_terminal() {
            return Ok(Frame::Ignored);
        }

        let line = line.trim_end_matches(['\r', '\n']);
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return Ok(Frame::Ignored);
        };
        let payload = payload.trim();

        if payload == DONE_SENTINEL {
            self.state = DecoderState::Completed;
            tracing::debug!(frames = self.frames, "stream completed");
            return Ok(Frame::Done);
        }

        match codec::decode::<StreamChunk>(payload) {
            Ok(chunk) => {
                self.frames += 1;
                Ok(Frame::Chunk(chunk))
            }
            Err(e) => {
                self.state = DecoderState::Failed;
                tracing::warn!(error = %e, "failed to decode stream frame");
                Err(e)
            }
        }
    }

    /// Fold a chunk returned by [`StreamDecoder::feed_line`] into the accumulator
    pub fn accumulate(&mut self, chunk: &StreamChunk) {
        if self.state.is_terminal() {
            return;
        }
        self.accumulator.process_chunk(chunk);
        self.state = DecoderState::Accumulating;
    }

    /// The source ended; anything short of the sentinel is a failure
    pub fn end_of_source(&mut self) -> Result<()> {
        match self.state {
            DecoderState::Completed | DecoderState::Failed => Ok(()),
            _ => Err(self.read_failed("source closed before [DONE]")),
        }
    }

    /// Handle the unterminated tail left when the source closed
    ///
    /// Only a complete sentinel counts; a partial event frame means the
    /// connection dropped mid-frame and is never decoded.
    pub fn feed_tail(&mut self, tail: &str) -> Result<Frame> {
        if self.state.is_terminal() {
            return Ok(Frame::Ignored);
        }

        let tail = tail.trim_end_matches(['\r', '\n']);
        match tail.strip_prefix(DATA_PREFIX) {
            Some(payload) if payload.trim() == DONE_SENTINEL => self.feed_line(tail),
            Some(_) => Err(self.read_failed("source closed mid-frame")),
            None => Ok(Frame::Ignored),
        }
    }

    /// The source failed to deliver the next line
    pub fn read_failed(&mut self, reason: impl fmt::Display) -> MistralError {
        self.state = DecoderState::Failed;
        tracing::warn!(frames = self.frames, %reason, "stream ended unexpectedly");
        MistralError::UnexpectedStreamEnd {
            reason: reason.to_string(),
        }
    }
}

/// Receives the events of one stream, in order
///
/// `on_chunk` is called once per decoded frame. Exactly one of
/// `on_complete` or `on_error` follows, and nothing is delivered after it.
pub trait StreamCallback {
    fn on_chunk(&mut self, chunk: &StreamChunk);

    fn on_complete(&mut self, accumulator: &StreamAccumulator);

    fn on_error(&mut self, error: MistralError);
}

/// Event yielded by [`decode_stream`]
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Chunk(StreamChunk),

    /// Sentinel seen; carries everything accumulated
    Done(StreamAccumulator),
}

/// Decode a line source synchronously, delivering events to `callback`
///
/// Returns the accumulator when the stream completed normally.
pub fn run_lines<I, E, C>(lines: I, callback: &mut C) -> Option<StreamAccumulator>
where
    I: IntoIterator<Item = std::result::Result<String, E>>,
    E: fmt::Display,
    C: StreamCallback + ?Sized,
{
    let mut decoder = StreamDecoder::new();

    for line in lines {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                callback.on_error(decoder.read_failed(e));
                return None;
            }
        };

        match decoder.feed_line(&line) {
            Ok(Frame::Ignored) => {}
            Ok(Frame::Chunk(chunk)) => {
                callback.on_chunk(&chunk);
                decoder.accumulate(&chunk);
            }
            Ok(Frame::Done) => {
                let accumulator = decoder.take_accumulator();
                callback.on_complete(&accumulator);
                return Some(accumulator);
            }
            Err(e) => {
                callback.on_error(e);
                return None;
            }
        }
    }

    if let Err(e) = decoder.end_of_source() {
        callback.on_error(e);
    }
    None
}

/// Adapt a raw SSE byte stream into decoded events
///
/// The stream ends after `Done` or after the first error. A source that
/// closes before the sentinel yields `UnexpectedStreamEnd`.
pub fn decode_stream<S>(bytes: S) -> impl Stream<Item = Result<StreamEvent>> + Send
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
{
    stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = StreamDecoder::new();
        let mut lines = LineBuffer::new();

        'read: loop {
            let batch = match bytes.next().await {
                Some(Ok(chunk)) => lines.push(&chunk),
                Some(Err(e)) => {
                    yield Err(decoder.read_failed(e));
                    break 'read;
                }
                None => {
                    if let Some(tail) = lines.finish() {
                        match decoder.feed_tail(&tail) {
                            Ok(Frame::Done) => {
                                yield Ok(StreamEvent::Done(decoder.take_accumulator()));
                                break 'read;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                yield Err(e);
                                break 'read;
                            }
                        }
                    }
                    if let Err(e) = decoder.end_of_source() {
                        yield Err(e);
                    }
                    break 'read;
                }
            };

            for line in batch {
                match decoder.feed_line(&line) {
                    Ok(Frame::Ignored) => {}
                    Ok(Frame::Chunk(chunk)) => {
                        yield Ok(StreamEvent::Chunk(chunk.clone()));
                        decoder.accumulate(&chunk);
                    }
                    Ok(Frame::Done) => {
                        yield Ok(StreamEvent::Done(decoder.take_accumulator()));
                        break 'read;
                    }
                    Err(e) => {
                        yield Err(e);
                        break 'read;
                    }
                }
            }
        }
    }
}

/// Decode a raw SSE byte stream, delivering events to `callback`
///
/// Returns the accumulator when the stream completed normally.
pub async fn drive<S, C>(bytes: S, callback: &mut C) -> Option<StreamAccumulator>
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
    C: StreamCallback + ?Sized,
{
    let events = decode_stream(bytes);
    futures::pin_mut!(events);

    while let Some(event) = events.next().await {
        match event {
            Ok(StreamEvent::Chunk(chunk)) => callback.on_chunk(&chunk),
            Ok(StreamEvent::Done(accumulator)) => {
                callback.on_complete(&accumulator);
                return Some(accumulator);
            }
            Err(e) => {
                callback.on_error(e);
                return None;
            }
        }
    }
    None
}
