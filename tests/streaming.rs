//! End-to-end streaming through `MistralClient` against a mock server.

use mistral_client::api::{
    CompletionRequest, FinishReason, StreamAccumulator, StreamCallback, StreamChunk,
};
use mistral_client::config::ClientConfig;
use mistral_client::error::MistralError;
use mistral_client::{ChatMessage, MistralClient, Role};

#[derive(Default)]
struct Recorder {
    chunks: Vec<String>,
    completions: usize,
    errors: Vec<MistralError>,
    delivered_after_terminal: bool,
}

impl Recorder {
    fn terminated(&self) -> bool {
        self.completions + self.errors.len() > 0
    }
}

impl StreamCallback for Recorder {
    fn on_chunk(&mut self, chunk: &StreamChunk) {
        self.delivered_after_terminal |= self.terminated();
        self.chunks.push(chunk.text());
    }

    fn on_complete(&mut self, _accumulator: &StreamAccumulator) {
        self.delivered_after_terminal |= self.terminated();
        self.completions += 1;
    }

    fn on_error(&mut self, error: MistralError) {
        self.delivered_after_terminal |= self.terminated();
        self.errors.push(error);
    }
}

fn request() -> CompletionRequest {
    CompletionRequest::new(
        "mistral-small-latest",
        vec![ChatMessage::user("Say hello").unwrap()],
    )
}

async fn serve(body: &str) -> (mockito::ServerGuard, MistralClient) {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .match_header("accept", "text/event-stream")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let config = ClientConfig::new("test-key").with_base_url(format!("{}/v1", server.url()));
    let client = MistralClient::with_config(config).unwrap();
    (server, client)
}

#[tokio::test]
async fn test_hello_stream_completes() {
    let (_server, client) = serve(concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":[{\"type\":\"text\",\"text\":\"Hel\"}]}}]}\n\n",
        ": keep-alive\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":[{\"type\":\"text\",\"text\":\"lo\"}]}}]}\n\n",
        "data: [DONE]\n\n",
    ))
    .await;

    let mut recorder = Recorder::default();
    let accumulator = client
        .chat_completion_stream(&request(), &mut recorder)
        .await
        .unwrap();

    assert_eq!(recorder.chunks, vec!["Hel", "lo"]);
    assert_eq!(recorder.completions, 1);
    assert!(recorder.errors.is_empty());
    assert!(!recorder.delivered_after_terminal);

    assert_eq!(accumulator.role(), Some(Role::Assistant));
    assert_eq!(accumulator.text(), "Hello");
    let message = accumulator.into_message();
    assert_eq!(message.role(), Role::Assistant);
    assert_eq!(message.text_content().as_deref(), Some("Hello"));
}

#[tokio::test]
async fn test_closed_stream_reports_unexpected_end() {
    let (_server, client) = serve(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"Hel\"}}]}\n\n",
    )
    .await;

    let mut recorder = Recorder::default();
    let result = client.chat_completion_stream(&request(), &mut recorder).await;

    assert!(result.is_none());
    assert_eq!(recorder.chunks, vec!["Hel"]);
    assert_eq!(recorder.completions, 0);
    assert_eq!(recorder.errors.len(), 1);
    assert!(matches!(
        recorder.errors[0],
        MistralError::UnexpectedStreamEnd { .. }
    ));
    assert!(!recorder.delivered_after_terminal);
}

#[tokio::test]
async fn test_tool_call_stream() {
    let (_server, client) = serve(concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"tool_calls\":[{\"id\":\"call_1\",\"index\":0,\"function\":{\"name\":\"add\",\"arguments\":\"{\\\"a\\\":\"}}]}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"1}\"}}]},\"finish_reason\":\"tool_calls\"}]}\n\n",
        "data: [DONE]\n\n",
    ))
    .await;

    let mut recorder = Recorder::default();
    let accumulator = client
        .chat_completion_stream(&request(), &mut recorder)
        .await
        .unwrap();

    assert_eq!(
        accumulator.choice(0).unwrap().finish_reason(),
        Some(FinishReason::ToolCalls)
    );
    let message = accumulator.into_message();
    let calls = message.tool_calls().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].id.as_deref(), Some("call_1"));
    assert_eq!(calls[0].function_name, "add");
    assert_eq!(calls[0].arguments_json, "{\"a\":1}");
    assert!(message.content().is_none());
}

#[tokio::test]
async fn test_malformed_frame_stops_stream() {
    let (_server, client) = serve(concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"a\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"robot\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"b\"}}]}\n\n",
        "data: [DONE]\n\n",
    ))
    .await;

    let mut recorder = Recorder::default();
    client.chat_completion_stream(&request(), &mut recorder).await;

    assert_eq!(recorder.chunks, vec!["a"]);
    assert_eq!(recorder.completions, 0);
    let error = &recorder.errors[0];
    assert!(matches!(error, MistralError::UnknownVariant { value, .. } if value == "robot"));
    assert!(error.fragment().unwrap().contains("robot"));
}

#[tokio::test]
async fn test_http_error_goes_to_on_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(500)
        .with_body("upstream exploded")
        .create_async()
        .await;

    let client =
        MistralClient::with_config(ClientConfig::new("k").with_base_url(server.url())).unwrap();
    let mut recorder = Recorder::default();
    client.chat_completion_stream(&request(), &mut recorder).await;

    assert!(recorder.chunks.is_empty());
    assert!(matches!(
        &recorder.errors[0],
        MistralError::Api { status: 500, body } if body == "upstream exploded"
    ));
}
