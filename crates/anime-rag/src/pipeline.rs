//! Pipeline construction: load, split, index, connect the model

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;

use crate::chain::{RagChain, VectorRetriever};
use crate::config::{LlmConfig, PipelineConfig};
use crate::error::{Error, Result};
use crate::ingestion::{DocumentLoader, TextSplitter};
use crate::retrieval::VectorStore;
use crate::{embeddings, generation};

/// A ready-to-query chain and the configuration it was built from
pub struct Pipeline {
    pub chain: RagChain,
    pub config: PipelineConfig,
}

/// Builds pipelines from configuration
#[async_trait]
pub trait PipelineFactory: Send + Sync {
    async fn build(&self, config: &PipelineConfig) -> Result<Pipeline>;
}

/// Loads documents from disk, indexes them with the configured embedder and
/// connects the configured language model
pub struct DefaultPipelineFactory {
    llm_config: LlmConfig,
}

impl DefaultPipelineFactory {
    pub fn new(llm_config: LlmConfig) -> Self {
        Self { llm_config }
    }
}

#[async_trait]
impl PipelineFactory for DefaultPipelineFactory {
    async fn build(&self, config: &PipelineConfig) -> Result<Pipeline> {
        let start = Instant::now();
        config.validate()?;

        tracing::info!(
            "Building pipeline: data_dir={}, embedding_model={}, llm_model={}, k={}",
            config.data_dir.display(),
            config.embedding_model,
            config.llm_model,
            config.k_docs
        );

        let chunks = {
            let data_dir = config.data_dir.clone();
            let glob = config.file_glob.clone();
            let (size, overlap) = (config.chunk_size, config.chunk_overlap);

            tokio::task::spawn_blocking(move || {
                let documents = DocumentLoader::new(data_dir, &glob)?.load()?;
                Ok::<_, Error>(TextSplitter::new(size, overlap)?.split_documents(&documents))
            })
            .await
            .map_err(|e| Error::internal(format!("Task join error: {}", e)))??
        };

        let embedder = embeddings::from_model_id(&config.embedding_model, &self.llm_config).await?;
        let collection = collection_for_model(&config.collection, &config.embedding_model);
        let store = VectorStore::build(&chunks, embedder.clone(), &config.db_dir, &collection).await?;

        let llm = generation::from_model_id(&config.llm_model, &self.llm_config)?;

        let retriever = VectorRetriever::new(embedder, Arc::new(store), config.k_docs);
        let chain = RagChain::new(Arc::new(retriever), llm);

        tracing::info!(
            "Pipeline ready in {}ms ({} chunks indexed)",
            start.elapsed().as_millis(),
            chunks.len()
        );

        Ok(Pipeline {
            chain,
            config: config.clone(),
        })
    }
}

/// Collection holding vectors from one embedding model
///
/// Vectors from different models never share an index, even when their
/// dimensions match.
pub fn collection_for_model(collection: &str, embedding_model: &str) -> String {
    let digest = hex::encode(Sha256::digest(embedding_model.as_bytes()));
    format!("{}-{}", collection, &digest[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> DefaultPipelineFactory {
        DefaultPipelineFactory::new(LlmConfig::default())
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_loading() {
        let config = PipelineConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..PipelineConfig::default()
        };
        assert!(matches!(factory().build(&config).await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_missing_data_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            data_dir: dir.path().join("does-not-exist"),
            db_dir: dir.path().join("db"),
            ..PipelineConfig::default()
        };
        assert!(matches!(factory().build(&config).await, Err(Error::Io(_))));
    }

    #[test]
    fn test_collection_is_specific_to_embedding_model() {
        let minilm = collection_for_model("rag_collection", "sentence-transformers/all-MiniLM-L6-v2");
        let nomic = collection_for_model("rag_collection", "ollama:nomic-embed-text");

        assert!(minilm.starts_with("rag_collection-"));
        assert_eq!(minilm.len(), "rag_collection-".len() + 12);
        assert_ne!(minilm, nomic);
        assert_eq!(
            minilm,
            collection_for_model("rag_collection", "sentence-transformers/all-MiniLM-L6-v2")
        );
    }
}
