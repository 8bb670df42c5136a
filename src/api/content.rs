//! Message Content Chunks
//!
//! One typed unit of message content: text, an image or document reference,
//! or a citation reference.

use crate::error::{MistralError, Result};

/// A unit of message content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentChunk {
    /// Plain text
    Text { text: String },

    /// Image by remote URL or inline `data:` URI
    ImageRef { uri: String, detail: Option<String> },

    /// Document by URL
    DocumentRef { uri: String, name: Option<String> },

    /// Citation of one or more reference ids
    Reference { ids: ReferenceIds },
}

/// Non-empty, ordered list of citation reference ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceIds(Vec<i64>);

impl ReferenceIds {
    /// Wrap a list of ids, rejecting an empty one
    pub fn new(ids: Vec<i64>) -> Result<Self> {
        if ids.is_empty() {
            return Err(MistralError::InvalidArgument(
                "reference chunk needs at least one id".to_string(),
            ));
        }
        Ok(Self(ids))
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<i64> {
        self.0
    }
}

impl ContentChunk {
    /// Text chunk
    pub fn text(text: impl Into<String>) -> Self {
        ContentChunk::Text { text: text.into() }
    }

    /// Image chunk without a detail hint
    pub fn image_url(uri: impl Into<String>) -> Self {
        ContentChunk::ImageRef {
            uri: uri.into(),
            detail: None,
        }
    }

    /// Image chunk with a detail hint (e.g. "low", "high")
    pub fn image_url_with_detail(uri: impl Into<String>, detail: impl Into<String>) -> Self {
        ContentChunk::ImageRef {
            uri: uri.into(),
            detail: Some(detail.into()),
        }
    }

    /// Document chunk
    pub fn document_url(uri: impl Into<String>, name: Option<String>) -> Self {
        ContentChunk::DocumentRef {
            uri: uri.into(),
            name,
        }
    }

    /// Reference chunk; fails on an empty id list
    pub fn reference(ids: Vec<i64>) -> Result<Self> {
        Ok(ContentChunk::Reference {
            ids: ReferenceIds::new(ids)?,
        })
    }

    /// Wire discriminator (`type` field) of this variant
    pub fn kind(&self) -> &'static str {
        match self {
            ContentChunk::Text { .. } => "text",
            ContentChunk::ImageRef { .. } => "image_url",
            ContentChunk::DocumentRef { .. } => "document_url",
            ContentChunk::Reference { .. } => "reference",
        }
    }

    /// The text of a `Text` chunk
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentChunk::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Concatenate the text of every `Text` chunk in order, skipping other kinds
pub fn extract_text(chunks: &[ContentChunk]) -> String {
    chunks.iter().filter_map(ContentChunk::as_text).collect()
}
