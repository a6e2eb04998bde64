//! Ollama client for embeddings and answer generation

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

use super::lines::body_lines;
use super::{LlmProvider, TokenStream, CONNECT_TIMEOUT};

/// Bound on the `/api/tags` availability check
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Ollama API client
#[derive(Clone)]
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Base URL, e.g. `http://localhost:11434`
    base_url: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// One NDJSON line (or the whole body when not streaming)
#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(Duration::from_secs(timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::model_load(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Generate an embedding
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest { model, prompt: text })
            .send()
            .await
            .map_err(|e| Error::upstream(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(format!(
                "Embedding failed: HTTP {} - {}",
                status, body
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream(format!("Failed to parse embedding response: {}", e)))?;

        Ok(embed_response.embedding)
    }

    /// Generate a complete answer in one round trip
    pub async fn generate(&self, model: &str, prompt: &str, temperature: f32) -> Result<String> {
        let response = self.send_generate(model, prompt, temperature, false).await?;

        let chunk: GenerateChunk = response
            .json()
            .await
            .map_err(|e| Error::upstream(format!("Failed to parse generation response: {}", e)))?;

        if let Some(error) = chunk.error {
            return Err(Error::upstream(format!("Generation failed: {}", error)));
        }

        Ok(chunk.response)
    }

    /// Generate an answer as a stream of fragments
    pub async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<TokenStream> {
        let response = self.send_generate(model, prompt, temperature, true).await?;

        let stream = async_stream::try_stream! {
            let lines = body_lines(response);
            futures::pin_mut!(lines);

            while let Some(line) = lines.next().await {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }

                let chunk: GenerateChunk = serde_json::from_str(&line).map_err(|e| {
                    Error::upstream(format!("Malformed stream chunk: {}", e))
                })?;

                if let Some(error) = chunk.error {
                    Err(Error::upstream(format!("Generation failed: {}", error)))?;
                }
                if !chunk.response.is_empty() {
                    yield chunk.response;
                }
                if chunk.done {
                    break;
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn send_generate(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model,
            prompt,
            stream,
            options: GenerateOptions { temperature },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::upstream(format!("Generation request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(format!(
                "Generation failed: HTTP {} - {}",
                status, body
            )));
        }

        Ok(response)
    }
}

/// Ollama LLM provider
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
    model: String,
    temperature: f32,
}

impl OllamaLlm {
    /// Create a provider for `model` on an existing client
    pub fn new(client: Arc<OllamaClient>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        tracing::info!("Generating answer with model: {}", self.model);
        self.client.generate(&self.model, prompt, self.temperature).await
    }

    async fn stream(&self, prompt: &str) -> Result<TokenStream> {
        tracing::info!("Streaming answer with model: {}", self.model);
        self.client
            .generate_stream(&self.model, prompt, self.temperature)
            .await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn llm(server: &MockServer) -> OllamaLlm {
        let client = Arc::new(OllamaClient::new(server.uri(), 5).unwrap());
        OllamaLlm::new(client, "llama3.2", 0.3)
    }

    #[tokio::test]
    async fn test_complete_returns_response_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({"model": "llama3.2", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": "1. Mushishi",
                "done": true
            })))
            .mount(&server)
            .await;

        let answer = llm(&server).complete("recommend").await.unwrap();
        assert_eq!(answer, "1. Mushishi");
    }

    #[tokio::test]
    async fn test_health_check_reflects_server_availability() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": []})))
            .mount(&server)
            .await;

        assert!(OllamaClient::new(server.uri(), 5).unwrap().health_check().await);
        assert!(!OllamaClient::new("http://127.0.0.1:9", 5).unwrap().health_check().await);
    }

    #[tokio::test]
    async fn test_stalled_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"response": "late", "done": true}))
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = Arc::new(OllamaClient::new(server.uri(), 1).unwrap());
        let err = OllamaLlm::new(client, "llama3.2", 0.3).complete("recommend").await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }

    #[tokio::test]
    async fn test_error_status_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not found"))
            .mount(&server)
            .await;

        let err = llm(&server).complete("recommend").await.unwrap_err();
        assert!(matches!(err, Error::Upstream(ref m) if m.contains("model not found")));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_upstream_error() {
        let client = Arc::new(OllamaClient::new("http://127.0.0.1:9", 2).unwrap());
        let err = OllamaLlm::new(client, "llama3.2", 0.3)
            .complete("recommend")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }

    #[tokio::test]
    async fn test_stream_yields_fragments_in_order() {
        let server = MockServer::start().await;
        let body = concat!(
            "{\"response\":\"Cowboy \",\"done\":false}\n",
            "{\"response\":\"Bebop\",\"done\":false}\n",
            "{\"response\":\"\",\"done\":true}\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let stream = llm(&server).stream("recommend").await.unwrap();
        let fragments: Vec<String> = stream.map(|r| r.unwrap()).collect().await;

        assert_eq!(fragments, vec!["Cowboy ", "Bebop"]);
    }

    #[tokio::test]
    async fn test_stream_error_line_is_propagated() {
        let server = MockServer::start().await;
        let body = "{\"response\":\"partial\",\"done\":false}\n{\"error\":\"out of memory\"}\n";
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let stream = llm(&server).stream("recommend").await.unwrap();
        let items: Vec<Result<String>> = stream.collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(matches!(items[1], Err(Error::Upstream(_))));
    }

    #[tokio::test]
    async fn test_embed_returns_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": [0.1, 0.2, 0.3]
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::new(server.uri(), 5).unwrap();
        let vector = client.embed("nomic-embed-text", "hello").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }
}
