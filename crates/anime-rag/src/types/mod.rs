//! Core types for the RAG service

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, Document, DocumentSource};
pub use query::QueryRequest;
pub use response::{ConfigResponse, QueryResponse, StatusResponse, TokenEvent};
