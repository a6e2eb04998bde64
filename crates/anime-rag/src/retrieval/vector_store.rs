//! Persistent chunk index backed by ruvector-core

use async_trait::async_trait;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, Weak};

use ruvector_core::types::{DbOptions, HnswConfig};
use ruvector_core::{DistanceMetric, SearchQuery as CoreSearchQuery, VectorDB, VectorEntry};

use crate::embeddings::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::types::Chunk;

use super::{SearchResult, VectorStoreProvider};

/// Chunks embedded per `embed_batch` call while indexing
const INDEX_BATCH_SIZE: usize = 64;

/// Databases currently open in this process, keyed by file path
///
/// The storage file can only be opened once per process, so a rebuild that
/// targets the collection the live pipeline is serving shares its handle.
static OPEN_DATABASES: OnceLock<Mutex<HashMap<PathBuf, Weak<OpenDatabase>>>> = OnceLock::new();

struct OpenDatabase {
    db: VectorDB,
    dimensions: usize,
}

/// Vector store wrapper for ruvector-core
pub struct VectorStore {
    /// Underlying vector database
    handle: Arc<OpenDatabase>,
    /// Database file
    path: PathBuf,
}

impl VectorStore {
    /// Open (or create) `<persist_path>/<collection>.db`
    pub fn open(persist_path: &Path, collection: &str, dimensions: usize) -> Result<Self> {
        std::fs::create_dir_all(persist_path)?;
        let path = persist_path.canonicalize()?.join(format!("{}.db", collection));

        let mut open = OPEN_DATABASES.get_or_init(Default::default).lock();
        open.retain(|_, db| db.strong_count() > 0);

        if let Some(handle) = open.get(&path).and_then(Weak::upgrade) {
            if handle.dimensions != dimensions {
                return Err(Error::VectorDb(format!(
                    "{} is in use with {} dimensions, cannot reopen with {}",
                    path.display(),
                    handle.dimensions,
                    dimensions
                )));
            }
            tracing::debug!("Reusing open vector database {}", path.display());
            return Ok(Self { handle, path });
        }

        let options = DbOptions {
            dimensions,
            distance_metric: DistanceMetric::Cosine,
            storage_path: path.to_string_lossy().to_string(),
            hnsw_config: Some(HnswConfig {
                m: 16,
                ef_construction: 200,
                ef_search: 100,
                max_elements: 1_000_000,
            }),
            quantization: None,
        };

        let db = VectorDB::new(options).map_err(|e| Error::VectorDb(e.to_string()))?;
        let handle = Arc::new(OpenDatabase { db, dimensions });
        open.insert(path.clone(), Arc::downgrade(&handle));

        Ok(Self { handle, path })
    }

    /// Open the collection and index every chunk it does not hold yet
    ///
    /// Chunk ids are content-derived, so a chunk that is already indexed is
    /// skipped rather than embedded and stored again. Entries are never
    /// removed from a live index.
    pub async fn build(
        chunks: &[Chunk],
        embedder: Arc<dyn EmbeddingProvider>,
        persist_path: &Path,
        collection: &str,
    ) -> Result<Self> {
        let store = Self::open(persist_path, collection, embedder.dimensions())?;
        tracing::info!(
            "Indexing {} chunks into {} ({} dimensions, {})",
            chunks.len(),
            store.path.display(),
            store.dimensions(),
            embedder.name()
        );

        let mut skipped = 0usize;
        for batch in chunks.chunks(INDEX_BATCH_SIZE) {
            let mut pending = Vec::with_capacity(batch.len());
            for chunk in batch {
                if store.contains(&chunk.id)? {
                    skipped += 1;
                } else {
                    pending.push(chunk);
                }
            }
            if pending.is_empty() {
                continue;
            }

            let texts: Vec<String> = pending.iter().map(|c| c.content.clone()).collect();
            let vectors = embedder.embed_batch(&texts).await?;

            if vectors.len() != pending.len() {
                return Err(Error::embedding(format!(
                    "Expected {} embeddings, got {}",
                    pending.len(),
                    vectors.len()
                )));
            }

            for (chunk, vector) in pending.into_iter().zip(vectors) {
                store.insert(chunk, vector)?;
            }
            tracing::debug!("Indexed batch of {} chunks", texts.len());
        }

        tracing::info!(
            "Vector store ready with {} entries ({} already indexed)",
            store.len()?,
            skipped
        );
        Ok(store)
    }

    /// Whether an entry with this id is stored
    pub fn contains(&self, id: &str) -> Result<bool> {
        Ok(self
            .handle
            .db
            .get(id)
            .map_err(|e| Error::VectorDb(e.to_string()))?
            .is_some())
    }

    /// Store a chunk with its vector
    pub fn insert(&self, chunk: &Chunk, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimensions() {
            return Err(Error::VectorDb(format!(
                "Vector for chunk {} has {} dimensions, expected {}",
                chunk.id,
                vector.len(),
                self.dimensions()
            )));
        }

        let entry = VectorEntry {
            id: Some(chunk.id.clone()),
            vector,
            metadata: Some(chunk.to_vector_metadata()),
        };
        self.handle.db.insert(entry).map_err(|e| Error::VectorDb(e.to_string()))?;
        Ok(())
    }

    /// Nearest chunks to `query`, closest first
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let results = self
            .handle
            .db
            .search(CoreSearchQuery {
                vector: query.to_vec(),
                k,
                filter: None,
                ef_search: None,
            })
            .map_err(|e| Error::VectorDb(e.to_string()))?;

        let mut search_results: Vec<SearchResult> = results
            .into_iter()
            .filter_map(|result| {
                let metadata = result.metadata.as_ref()?;
                Some(SearchResult {
                    chunk: Chunk::from_vector_metadata(&result.id, metadata),
                    distance: result.score,
                })
            })
            .collect();

        sort_by_distance(&mut search_results);
        search_results.truncate(k);

        Ok(search_results)
    }

    /// Get entry count
    pub fn len(&self) -> Result<usize> {
        self.handle.db.len().map_err(|e| Error::VectorDb(e.to_string()))
    }

    /// Check if empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Embedding dimensions of this collection
    pub fn dimensions(&self) -> usize {
        self.handle.dimensions
    }
}

#[async_trait]
impl VectorStoreProvider for VectorStore {
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        VectorStore::search(self, query, k)
    }

    fn len(&self) -> Result<usize> {
        VectorStore::len(self)
    }
}

/// Ascending distance, ties by ascending insertion sequence
pub(crate) fn sort_by_distance(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(Ordering::Equal)
            .then(a.chunk.sequence.cmp(&b.chunk.sequence))
    });
}
