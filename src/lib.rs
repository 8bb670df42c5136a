//! Mistral Client - typed chat completion client for the Mistral AI API
//!
//! The conversation model lives in [`api`]: messages and content chunks, tool
//! declarations, the JSON wire codec and the incremental stream decoder.
//! [`MistralClient`] ties them to an HTTP transport.

pub mod api;
pub mod client;
pub mod config;
pub mod error;

use api::codec::{self, Wire};
use api::streaming::{self, StreamAccumulator, StreamCallback, StreamEvent};
use api::{
    validate, CompletionRequest, CompletionResponse, EmbeddingRequest, EmbeddingResponse,
    ListModelsResponse,
};
use client::HttpClient;
use config::{ClientConfig, ConfigLoader};
use error::{MistralError, Result};
use futures::Stream;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

pub use api::{ChatMessage, ContentChunk, MessageListBuilder, Role, Tool, ToolCall, ToolChoice};

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";
const MODELS_PATH: &str = "/models";
const EMBEDDINGS_PATH: &str = "/embeddings";

/// The main Mistral client
#[derive(Debug, Clone)]
pub struct MistralClient {
    /// HTTP client
    http_client: HttpClient,
}

impl MistralClient {
    /// Create a new client from config files and the environment
    ///
    /// A `.env` file in the working directory is loaded first, if present.
    pub fn new() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let loader = ConfigLoader::new()?;
        Self::with_config(loader.into_config())
    }

    /// Create a client with a custom config path
    pub fn with_config_path(path: impl AsRef<Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let loader = ConfigLoader::from_path(path)?;
        Self::with_config(loader.into_config())
    }

    /// Create a client from a config object
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            http_client: HttpClient::new(config)?,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        self.http_client.config()
    }

    /// Make a non-streaming completion request
    ///
    /// `request.stream` is ignored and sent as `false`.
    pub async fn chat_completion(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let body = completion_body(request, false)?;
        let text = self.http_client.post_json(CHAT_COMPLETIONS_PATH, body).await?;
        codec::decode(&text)
    }

    /// Make a streaming completion request, delivering events to `callback`
    ///
    /// Every failure, including validation and HTTP errors before the first
    /// frame, is reported through `on_error`. Returns the accumulator when
    /// the stream completed normally.
    pub async fn chat_completion_stream<C>(
        &self,
        request: &CompletionRequest,
        callback: &mut C,
    ) -> Option<StreamAccumulator>
    where
        C: StreamCallback + ?Sized,
    {
        match self.open_stream(request).await {
            Ok(bytes) => streaming::drive(bytes, callback).await,
            Err(e) => {
                callback.on_error(e);
                None
            }
        }
    }

    /// Make a streaming completion request, returning its events as a stream
    pub async fn chat_completion_events(
        &self,
        request: &CompletionRequest,
    ) -> Result<impl Stream<Item = Result<StreamEvent>> + Send> {
        let bytes = self.open_stream(request).await?;
        Ok(streaming::decode_stream(bytes))
    }

    async fn open_stream(&self, request: &CompletionRequest) -> Result<client::ByteStream> {
        let body = completion_body(request, true)?;
        self.http_client.post_stream(CHAT_COMPLETIONS_PATH, body).await
    }

    /// List models available to this API key
    pub async fn list_models(&self) -> Result<ListModelsResponse> {
        let text = self.http_client.get(MODELS_PATH).await?;
        parse_body(&text)
    }

    /// Embed each input string
    pub async fn embeddings(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse> {
        if request.model.trim().is_empty() {
            return Err(MistralError::InvalidArgument(
                "embedding model must not be blank".to_string(),
            ));
        }
        if request.input.is_empty() {
            return Err(MistralError::InvalidArgument(
                "embedding input must not be empty".to_string(),
            ));
        }

        let body = serde_json::to_string(request)
            .map_err(|e| MistralError::InvalidArgument(format!("Unserializable request: {}", e)))?;
        let text = self.http_client.post_json(EMBEDDINGS_PATH, body).await?;
        parse_body(&text)
    }
}

/// Validate and serialize a completion request with the given `stream` flag
fn completion_body(request: &CompletionRequest, stream: bool) -> Result<String> {
    let violations = validate(request);
    if !violations.is_empty() {
        return Err(MistralError::Validation(violations));
    }

    let mut body = request.encode();
    if let Some(obj) = body.as_object_mut() {
        obj.insert("stream".to_string(), Value::Bool(stream));
    }
    Ok(body.to_string())
}

/// Parse a plain serde response body, keeping the raw text on failure
fn parse_body<T: DeserializeOwned>(text: &str) -> Result<T> {
    let value = codec::parse_json(text)?;
    serde_json::from_value(value).map_err(|e| MistralError::MalformedPayload {
        reason: e.to_string(),
        fragment: text.to_string(),
    })
}

/// Install a `tracing` fmt subscriber filtered by `filter` (e.g. `"mistral_client=debug"`)
///
/// Falls back to `info` when the filter does not parse. Does nothing if a
/// global subscriber is already set.
pub fn init_logging(filter: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use mockito::Matcher;

    fn client_for(server: &mockito::Server) -> MistralClient {
        MistralClient::with_config(ClientConfig::new("test-key").with_base_url(server.url()))
            .unwrap()
    }

    fn hello_request() -> CompletionRequest {
        CompletionRequest::new(
            "mistral-small-latest",
            vec![ChatMessage::user("Say hello").unwrap()],
        )
    }

    #[test]
    fn test_completion_body_forces_stream_flag() {
        let request = hello_request().with_stream(true);
        let body: Value = serde_json::from_str(&completion_body(&request, false).unwrap()).unwrap();
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["content"][0]["text"], "Say hello");
    }

    #[tokio::test]
    async fn test_chat_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::PartialJsonString(
                r#"{"model":"mistral-small-latest","stream":false}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "id": "cmpl-1",
                    "object": "chat.completion",
                    "created": 1702256327,
                    "model": "mistral-small-latest",
                    "choices": [{
                        "index": 0,
                        "message": {"role": "assistant", "content": "Hello!"},
                        "finish_reason": "stop"
                    }],
                    "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
                }"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let response = client.chat_completion(&hello_request()).await.unwrap();

        assert_eq!(response.content().as_deref(), Some("Hello!"));
        assert_eq!(
            response.choices[0].message.content(),
            Some(&[ContentChunk::text("Hello!")][..])
        );
        assert_eq!(response.usage.unwrap().total_tokens, 5);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_validation_blocks_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server);
        let request = hello_request().with_temperature(3.0);
        let err = client.chat_completion(&request).await.unwrap_err();

        match err {
            MistralError::Validation(violations) => assert_eq!(violations[0].field, "temperature"),
            other => panic!("unexpected {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_json_response_keeps_raw_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create_async()
            .await;

        let client = client_for(&server);
        match client.chat_completion(&hello_request()).await.unwrap_err() {
            MistralError::InvalidJson { raw, .. } => assert_eq!(raw, "<html>gateway</html>"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_api_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body(r#"{"message":"Requests rate limit exceeded"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        match client.chat_completion(&hello_request()).await.unwrap_err() {
            MistralError::Api { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("rate limit"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_chat_completion_events() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJsonString(r#"{"stream":true}"#.to_string()))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(concat!(
                "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"Hi\"}}]}\n\n",
                "data: [DONE]\n\n",
            ))
            .create_async()
            .await;

        let client = client_for(&server);
        let events: Vec<Result<StreamEvent>> = client
            .chat_completion_events(&hello_request())
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        match &events[0] {
            Ok(StreamEvent::Chunk(chunk)) => assert_eq!(chunk.text(), "Hi"),
            other => panic!("unexpected {:?}", other),
        }
        match &events[1] {
            Ok(StreamEvent::Done(acc)) => assert_eq!(acc.text(), "Hi"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_models() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/models")
            .with_status(200)
            .with_body(r#"{"object":"list","data":[{"id":"mistral-large-latest","object":"model","created":1}]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let models = client.list_models().await.unwrap();
        assert!(models.get("mistral-large-latest").is_some());
    }

    #[tokio::test]
    async fn test_list_models_wrong_shape() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/models")
            .with_status(200)
            .with_body(r#"{"object":"list"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.list_models().await.unwrap_err();
        assert!(matches!(err, MistralError::MalformedPayload { .. }));
        assert_eq!(err.fragment(), Some(r#"{"object":"list"}"#));
    }

    #[tokio::test]
    async fn test_embeddings() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/embeddings")
            .match_body(Matcher::Json(serde_json::json!({
                "model": "mistral-embed",
                "input": ["a", "b"],
                "encoding_format": "float"
            })))
            .with_status(200)
            .with_body(
                r#"{"id":"e1","object":"list","model":"mistral-embed","data":[
                    {"object":"embedding","embedding":[0.1],"index":0},
                    {"object":"embedding","embedding":[0.2],"index":1}
                ]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let request = EmbeddingRequest::new("mistral-embed", vec!["a".into(), "b".into()]);
        let response = client.embeddings(&request).await.unwrap();

        assert_eq!(response.data.len(), 2);
        assert_eq!(response.data[1].index, 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_embeddings_rejects_empty_input() {
        let server = mockito::Server::new_async().await;
        let client = client_for(&server);
        let err = client
            .embeddings(&EmbeddingRequest::new("mistral-embed", Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, MistralError::InvalidArgument(_)));
    }
}
