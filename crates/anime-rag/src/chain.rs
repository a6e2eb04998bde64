//! Retrieval-augmented answer chain

use async_trait::async_trait;
use std::sync::Arc;

use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::generation::{LlmProvider, PromptBuilder, TokenStream};
use crate::retrieval::{SearchResult, VectorStoreProvider};

/// Finds the chunks relevant to a question
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, question: &str) -> Result<Vec<SearchResult>>;
}

/// Embeds the question and returns the `k` nearest chunks
pub struct VectorRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
    k: usize,
}

impl VectorRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStoreProvider>, k: usize) -> Self {
        Self { embedder, store, k }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, question: &str) -> Result<Vec<SearchResult>> {
        let query = self.embedder.embed(question).await?;
        let results = self.store.search(&query, self.k).await?;
        tracing::debug!("Retrieved {} chunks (k={})", results.len(), self.k);
        Ok(results)
    }
}

/// Retriever plus language model
///
/// Stateless per call: nothing from one question leaks into the next.
pub struct RagChain {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn LlmProvider>,
}

impl RagChain {
    pub fn new(retriever: Arc<dyn Retriever>, llm: Arc<dyn LlmProvider>) -> Self {
        Self { retriever, llm }
    }

    /// Answer a question in one round trip; the model output is returned verbatim
    pub async fn answer(&self, question: &str) -> Result<String> {
        let prompt = self.prompt(question).await?;
        let answer = self.llm.complete(&prompt).await?;
        tracing::info!("Answered with {} ({} chars)", self.llm.model(), answer.len());
        Ok(answer)
    }

    /// Same as [`answer`](Self::answer) but yields fragments as the model produces them
    pub async fn answer_stream(&self, question: &str) -> Result<TokenStream> {
        let prompt = self.prompt(question).await?;
        self.llm.stream(&prompt).await
    }

    async fn prompt(&self, question: &str) -> Result<String> {
        let results = self.retriever.retrieve(question).await?;
        let context = PromptBuilder::build_context(&results);
        Ok(PromptBuilder::build_recommendation_prompt(&context, question))
    }
}
