//! Model listing and embedding types
//!
//! These payloads have no polymorphic fields, so they use plain serde derives.

use crate::api::completion::Usage;
use serde::{Deserialize, Serialize};

/// What a model can be used for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    #[serde(default)]
    pub completion_chat: bool,

    /// Fill-in-the-middle completions
    #[serde(default)]
    pub completion_fim: bool,

    #[serde(default)]
    pub function_calling: bool,

    #[serde(default)]
    pub fine_tuning: bool,

    #[serde(default)]
    pub vision: bool,

    #[serde(default)]
    pub classification: bool,
}

/// A model available to the account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Identifier to pass as `model` in requests
    pub id: String,

    #[serde(default)]
    pub object: String,

    /// Creation time, seconds since the Unix epoch
    #[serde(default)]
    pub created: u64,

    #[serde(default)]
    pub owned_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<ModelCapabilities>,
}

/// Response of `GET /models`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListModelsResponse {
    #[serde(default)]
    pub object: String,

    #[serde(rename = "data")]
    pub models: Vec<Model>,
}

impl ListModelsResponse {
    /// Find a model by id
    pub fn get(&self, id: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.id == id)
    }
}

/// Request for `POST /embeddings`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub model: String,

    /// Strings to embed, one vector each
    pub input: Vec<String>,

    /// Only "float" is accepted by the API
    #[serde(default = "default_encoding_format")]
    pub encoding_format: String,
}

fn default_encoding_format() -> String {
    "float".to_string()
}

impl EmbeddingRequest {
    pub fn new(model: impl Into<String>, input: Vec<String>) -> Self {
        Self {
            model: model.into(),
            input,
            encoding_format: default_encoding_format(),
        }
    }
}

/// One embedding vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatEmbedding {
    #[serde(default)]
    pub object: String,

    pub embedding: Vec<f32>,

    /// Position of the input string this vector belongs to
    pub index: u32,
}

/// Response of `POST /embeddings`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub id: String,

    #[serde(default)]
    pub object: String,

    pub data: Vec<FloatEmbedding>,

    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}
