//! Language model clients and prompt assembly

mod lines;
mod ollama;
mod openai;
mod prompt;

pub use lines::{body_lines, LineBuffer};
pub use ollama::{OllamaClient, OllamaLlm};
pub use openai::OpenAiCompatibleClient;
pub use prompt::{PromptBuilder, CONTEXT_SEPARATOR};

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// Time allowed to establish a connection to a model server
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Answer fragments in generation order; ends when the model signals completion
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Uniform text-completion interface
///
/// Implementations:
/// - `OllamaLlm`: local Ollama server
/// - `OpenAiCompatibleClient`: Groq / OpenAI chat completions
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// One round-trip completion
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Incremental completion
    async fn stream(&self, prompt: &str) -> Result<TokenStream>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model being used
    fn model(&self) -> &str;
}

/// Instantiate a provider from a `provider:model` id
///
/// Supported providers: `ollama`, `groq` (`GROQ_API_KEY`), `openai` (`OPENAI_API_KEY`).
pub fn from_model_id(model_id: &str, config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    let (provider, model) = model_id.split_once(':').ok_or_else(|| {
        Error::model_load(format!(
            "Language model '{}' must be given as provider:model (e.g. groq:llama-3.1-8b-instant)",
            model_id
        ))
    })?;

    if model.is_empty() {
        return Err(Error::model_load(format!("Language model '{}' has no model name", model_id)));
    }

    match provider {
        "ollama" => {
            let client = Arc::new(OllamaClient::new(&config.ollama_url, config.timeout_secs)?);
            Ok(Arc::new(OllamaLlm::new(client, model, config.temperature)))
        }
        "groq" | "openai" => {
            let (base_url, key_var) = if provider == "groq" {
                (&config.groq_url, "GROQ_API_KEY")
            } else {
                (&config.openai_url, "OPENAI_API_KEY")
            };

            let api_key = std::env::var(key_var)
                .ok()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    Error::model_load(format!("{} is not set; required for {}", key_var, model_id))
                })?;

            Ok(Arc::new(OpenAiCompatibleClient::new(
                provider,
                base_url.as_str(),
                api_key,
                model,
                config.temperature,
                config.timeout_secs,
            )?))
        }
        other => Err(Error::model_load(format!(
            "Unknown language model provider '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_model_id() {
        let llm = from_model_id("ollama:llama3.2:3b", &LlmConfig::default()).unwrap();
        assert_eq!(llm.name(), "ollama");
        assert_eq!(llm.model(), "llama3.2:3b");
    }

    #[test]
    fn test_missing_provider_is_model_load_error() {
        assert!(matches!(
            from_model_id("llama-3.1-8b-instant", &LlmConfig::default()),
            Err(Error::ModelLoad(_))
        ));
        assert!(matches!(
            from_model_id("huggingface:zephyr", &LlmConfig::default()),
            Err(Error::ModelLoad(_))
        ));
        assert!(matches!(
            from_model_id("ollama:", &LlmConfig::default()),
            Err(Error::ModelLoad(_))
        ));
    }
}
