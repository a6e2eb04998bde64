//! anime-rag: retrieval-augmented anime recommendations
//!
//! Loads a catalogue of anime descriptions (CSV rows or text files), splits
//! them into overlapping chunks, indexes them in a ruvector-core vector store
//! with local ONNX (or Ollama) embeddings, and answers questions through an
//! Ollama or OpenAI-compatible language model, either in one response or as
//! a server-sent event stream.

pub mod chain;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod retrieval;
pub mod server;
pub mod types;

pub use chain::{RagChain, Retriever, VectorRetriever};
pub use config::RagConfig;
pub use error::{Error, Result};
pub use pipeline::{DefaultPipelineFactory, Pipeline, PipelineFactory};
pub use types::{
    document::{Chunk, Document, DocumentSource},
    query::QueryRequest,
    response::QueryResponse,
};
