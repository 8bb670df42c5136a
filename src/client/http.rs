//! HTTP Client
//!
//! Async HTTP transport for the Mistral API. Requests are sent once; a
//! non-success status is returned as [`MistralError::Api`] with the body.

use crate::config::ClientConfig;
use crate::error::{MistralError, Result};
use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use std::pin::Pin;

/// Raw response body chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// HTTP client bound to one API root and key
#[derive(Debug, Clone)]
pub struct HttpClient {
    /// Inner reqwest client
    client: Client,

    config: ClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: ClientConfig) -> Result<Self> {
        let api_key = config.api_key.as_deref().ok_or_else(|| {
            MistralError::Config(format!(
                "No API key configured; set {}",
                crate::config::API_KEY_ENV
            ))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| MistralError::Config(format!("Invalid API key format: {}", e)))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| MistralError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// POST a JSON body and return the response body text
    pub async fn post_json(&self, path: &str, body: String) -> Result<String> {
        let url = self.config.endpoint(path);
        tracing::debug!(%url, bytes = body.len(), "POST");

        let request = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .body(body);
        let response = send(request).await?;
        Ok(response.text().await?)
    }

    /// GET a path and return the response body text
    pub async fn get(&self, path: &str) -> Result<String> {
        let url = self.config.endpoint(path);
        tracing::debug!(%url, "GET");

        let request = self.client.get(&url).header(ACCEPT, "application/json");
        let response = send(request).await?;
        Ok(response.text().await?)
    }

    /// POST a JSON body and return the event-stream body as raw bytes
    pub async fn post_stream(&self, path: &str, body: String) -> Result<ByteStream> {
        let url = self.config.endpoint(path);
        tracing::debug!(%url, bytes = body.len(), "POST (stream)");

        let request = self
            .client
            .post(&url)
            .header(ACCEPT, "text/event-stream")
            .body(body);
        let response = send(request).await?;

        let mut byte_stream = response.bytes_stream();
        let s = stream! {
            while let Some(chunk) = byte_stream.next().await {
                yield chunk.map_err(MistralError::from);
            }
        };

        Ok(Box::pin(s))
    }
}

/// Send a request, turning a non-success status into an error
async fn send(request: RequestBuilder) -> Result<Response> {
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), "API request failed");
        return Err(MistralError::Api {
            status: status.as_u16(),
            body,
        });
    }

    Ok(response)
}
