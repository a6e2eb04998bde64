//! Text embedding providers

mod ollama;
mod onnx;

pub use ollama::OllamaEmbedder;
pub use onnx::OnnxEmbedder;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::generation::OllamaClient;

/// Maps text to fixed-length vectors
///
/// Every vector returned by one provider has `dimensions()` entries, and
/// the same text always embeds to the same vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Output vector width
    fn dimensions(&self) -> usize;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Load an embedder by model id
///
/// `ollama:<model>` uses the local Ollama server; anything else is treated
/// as a HuggingFace sentence-transformers id and run through ONNX Runtime.
pub async fn from_model_id(model_id: &str, config: &LlmConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    if model_id.trim().is_empty() {
        return Err(Error::model_load("Embedding model id is empty"));
    }

    if let Some(model) = model_id.strip_prefix("ollama:") {
        let client = Arc::new(OllamaClient::new(&config.ollama_url, config.timeout_secs)?);
        return Ok(Arc::new(OllamaEmbedder::connect(client, model).await?));
    }

    Ok(Arc::new(OnnxEmbedder::load(model_id, config).await?))
}
