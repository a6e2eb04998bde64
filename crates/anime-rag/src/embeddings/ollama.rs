//! Embeddings served by a local Ollama instance (`ollama:<model>` ids)

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::generation::OllamaClient;

use super::EmbeddingProvider;

/// Ollama embedding provider
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    model: String,
    dimensions: usize,
}

impl OllamaEmbedder {
    /// Connect and sample the model once to learn its output width
    pub async fn connect(client: Arc<OllamaClient>, model: impl Into<String>) -> Result<Self> {
        let model = model.into();

        let sample = client
            .embed(&model, "dimension check")
            .await
            .map_err(|e| Error::model_load(format!("Embedding model {} is unavailable: {}", model, e)))?;

        if sample.is_empty() {
            return Err(Error::model_load(format!(
                "Embedding model {} returned an empty vector",
                model
            )));
        }

        tracing::info!("Ollama embedder ready: {} ({} dimensions)", model, sample.len());

        Ok(Self {
            client,
            model,
            dimensions: sample.len(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self
            .client
            .embed(&self.model, text)
            .await
            .map_err(|e| Error::embedding(e.to_string()))?;

        if vector.len() != self.dimensions {
            return Err(Error::embedding(format!(
                "Dimension mismatch: expected {}, got {}",
                self.dimensions,
                vector.len()
            )));
        }
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_embeddings(server: &MockServer, status: u16, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_connect_learns_dimensions() {
        let server = MockServer::start().await;
        mock_embeddings(&server, 200, serde_json::json!({"embedding": [0.5, 0.5, 0.0, 0.0]})).await;

        let client = Arc::new(OllamaClient::new(server.uri(), 5).unwrap());
        let embedder = OllamaEmbedder::connect(client, "nomic-embed-text").await.unwrap();

        assert_eq!(embedder.dimensions(), 4);
        let batch = embedder
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_model_is_model_load_error() {
        let server = MockServer::start().await;
        mock_embeddings(&server, 404, serde_json::json!({"error": "model not found"})).await;

        let client = Arc::new(OllamaClient::new(server.uri(), 5).unwrap());
        let result = OllamaEmbedder::connect(client, "missing").await;

        assert!(matches!(result, Err(Error::ModelLoad(_))));
    }

    #[tokio::test]
    async fn test_same_text_embeds_identically() {
        let server = MockServer::start().await;
        for (prompt, embedding) in [
            ("dimension check", [0.0, 0.0, 0.0, 1.0]),
            ("Name: Mushishi", [0.6, 0.8, 0.0, 0.0]),
            ("Name: Haikyuu!!", [0.0, 0.6, 0.8, 0.0]),
        ] {
            Mock::given(method("POST"))
                .and(path("/api/embeddings"))
                .and(body_partial_json(serde_json::json!({"model": "nomic-embed-text", "prompt": prompt})))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"embedding": embedding})))
                .mount(&server)
                .await;
        }

        let client = Arc::new(OllamaClient::new(server.uri(), 5).unwrap());
        let embedder = OllamaEmbedder::connect(client, "nomic-embed-text").await.unwrap();

        let first = embedder.embed("Name: Mushishi").await.unwrap();
        let second = embedder.embed("Name: Mushishi").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), embedder.dimensions());

        let batch = embedder
            .embed_batch(&["Name: Mushishi".to_string(), "Name: Haikyuu!!".to_string()])
            .await
            .unwrap();
        assert_eq!(batch[0], first);
        assert_ne!(batch[1], first);
    }
}
