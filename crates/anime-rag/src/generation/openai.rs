//! OpenAI-compatible chat completions client (Groq, OpenAI)

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

use super::lines::body_lines;
use super::{LlmProvider, TokenStream, CONNECT_TIMEOUT};

/// Chat completions client for any OpenAI-compatible endpoint
pub struct OpenAiCompatibleClient {
    client: Client,
    /// Provider label used in logs (`groq`, `openai`)
    provider: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChatDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatContent {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChatDelta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleClient {
    /// Create a client for `model` at `base_url`
    pub fn new(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::model_load(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            provider: provider.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
        })
    }

    async fn send(&self, prompt: &str, stream: bool) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            stream,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::upstream(format!("{} request failed: {}", self.provider, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(format!(
                "{} returned HTTP {} - {}",
                self.provider, status, body
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        tracing::info!("Generating answer with {} model: {}", self.provider, self.model);

        let response: ChatResponse = self
            .send(prompt, false)
            .await?
            .json()
            .await
            .map_err(|e| Error::upstream(format!("Failed to parse completion: {}", e)))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| Error::upstream("Completion contained no choices"))
    }

    async fn stream(&self, prompt: &str) -> Result<TokenStream> {
        tracing::info!("Streaming answer with {} model: {}", self.provider, self.model);

        let response = self.send(prompt, true).await?;

        let stream = async_stream::try_stream! {
            let lines = body_lines(response);
            futures::pin_mut!(lines);

            while let Some(line) = lines.next().await {
                let line = line?;
                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data == "[DONE]" {
                    break;
                }

                let chunk: ChatChunk = serde_json::from_str(data).map_err(|e| {
                    Error::upstream(format!("Malformed stream chunk: {}", e))
                })?;

                let mut finished = false;
                for choice in chunk.choices {
                    if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                        yield content;
                    }
                    finished |= choice.finish_reason.is_some();
                }
                if finished {
                    break;
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }
}
