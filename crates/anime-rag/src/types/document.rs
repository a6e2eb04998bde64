//! Document and chunk types with source tracking

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Where a document came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSource {
    /// Path of the source file, relative to the data directory
    pub path: String,
    /// Data row for row-oriented files (CSV), starting at 0
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub row: Option<usize>,
}

impl DocumentSource {
    /// Source for a whole file
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            row: None,
        }
    }

    /// Source for one row of a file
    pub fn row(path: impl Into<String>, row: usize) -> Self {
        Self {
            path: path.into(),
            row: Some(row),
        }
    }
}

/// A raw source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Text content
    pub content: String,
    /// Origin of the content
    pub source: DocumentSource,
}

impl Document {
    /// Create a new document
    pub fn new(content: impl Into<String>, source: DocumentSource) -> Self {
        Self {
            content: content.into(),
            source,
        }
    }
}

/// A bounded piece of a document, ready for embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic chunk ID (hex SHA-256 of source, position and content)
    pub id: String,
    /// Originating document
    pub source: DocumentSource,
    /// Text content
    pub content: String,
    /// Chunk index within its document
    pub chunk_index: u32,
    /// Grapheme offsets in the original document
    pub char_start: usize,
    pub char_end: usize,
    /// Position of this chunk in the indexing run
    pub sequence: u64,
}

impl Chunk {
    /// Create a new chunk
    pub fn new(
        source: DocumentSource,
        content: String,
        chunk_index: u32,
        char_start: usize,
        char_end: usize,
        sequence: u64,
    ) -> Self {
        let id = Self::compute_id(&source, chunk_index, &content);
        Self {
            id,
            source,
            content,
            chunk_index,
            char_start,
            char_end,
            sequence,
        }
    }

    fn compute_id(source: &DocumentSource, chunk_index: u32, content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.path.as_bytes());
        hasher.update([0u8]);
        if let Some(row) = source.row {
            hasher.update(row.to_le_bytes());
        }
        hasher.update([0u8]);
        hasher.update(chunk_index.to_le_bytes());
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Convert to vector metadata for storage
    pub fn to_vector_metadata(&self) -> HashMap<String, serde_json::Value> {
        let mut meta = HashMap::new();
        meta.insert("chunk_id".to_string(), serde_json::json!(self.id));
        meta.insert("source".to_string(), serde_json::json!(self.source.path));
        meta.insert("chunk_index".to_string(), serde_json::json!(self.chunk_index));
        meta.insert("char_start".to_string(), serde_json::json!(self.char_start));
        meta.insert("char_end".to_string(), serde_json::json!(self.char_end));
        meta.insert("sequence".to_string(), serde_json::json!(self.sequence));
        meta.insert("content".to_string(), serde_json::json!(self.content));

        if let Some(row) = self.source.row {
            meta.insert("row".to_string(), serde_json::json!(row));
        }

        meta
    }

    /// Rebuild a chunk from stored vector metadata
    pub fn from_vector_metadata(id: &str, metadata: &HashMap<String, serde_json::Value>) -> Self {
        let get_u64 = |key: &str| metadata.get(key).and_then(|v| v.as_u64());

        let path = metadata
            .get("source")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        Self {
            id: metadata
                .get("chunk_id")
                .and_then(|v| v.as_str())
                .unwrap_or(id)
                .to_string(),
            source: DocumentSource {
                path,
                row: get_u64("row").map(|r| r as usize),
            },
            content: metadata
                .get("content")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            chunk_index: get_u64("chunk_index").unwrap_or(0) as u32,
            char_start: get_u64("char_start").unwrap_or(0) as usize,
            char_end: get_u64("char_end").unwrap_or(0) as usize,
            sequence: get_u64("sequence").unwrap_or(u64::MAX),
        }
    }
}
