//! Vector retrieval

mod vector_store;

pub use vector_store::VectorStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Chunk;

/// Search result with chunk and distance
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The retrieved chunk
    pub chunk: Chunk,
    /// Cosine distance to the query (lower is closer)
    pub distance: f32,
}

/// Nearest-neighbour search over indexed chunks
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// At most `k` results, closest first
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>>;

    /// Number of indexed entries
    fn len(&self) -> Result<usize>;

    /// Check if empty
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
