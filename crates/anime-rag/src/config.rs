//! Configuration for the RAG service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming an explicit TOML config file
pub const CONFIG_PATH_ENV: &str = "ANIME_RAG_CONFIG";

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "anime-rag.toml";

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Pipeline configuration (replaceable at runtime via `/initialize`)
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Model endpoint configuration
    #[serde(default)]
    pub llm: LlmConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: RagConfig = toml::from_str(&raw).map_err(|e| {
            Error::config(format!("Invalid config file {}: {}", path.display(), e))
        })?;
        config.pipeline.validate()?;
        Ok(config)
    }

    /// Load configuration the way the server binary does
    ///
    /// Order: defaults, then `ANIME_RAG_CONFIG` (or `anime-rag.toml` if present),
    /// then individual `ANIME_RAG_*` environment variables.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.pipeline.validate()?;
        Ok(config)
    }

    /// Apply `ANIME_RAG_*` overrides from a variable lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("ANIME_RAG_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("ANIME_RAG_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| Error::config(format!("ANIME_RAG_PORT is not a port: {}", port)))?;
        }

        let update = ConfigUpdate {
            data_dir: lookup("ANIME_RAG_DATA_DIR").map(PathBuf::from),
            db_dir: lookup("ANIME_RAG_DB_DIR").map(PathBuf::from),
            embedding_model: lookup("ANIME_RAG_EMBEDDING_MODEL"),
            llm_model: lookup("ANIME_RAG_LLM_MODEL"),
            k_docs: lookup("ANIME_RAG_K_DOCS")
                .map(|k| {
                    k.parse().map_err(|_| {
                        Error::config(format!("ANIME_RAG_K_DOCS is not a number: {}", k))
                    })
                })
                .transpose()?,
            ..Default::default()
        };
        self.pipeline = self.pipeline.merged(&update);

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Allowed CORS origins (empty allows any origin)
    pub cors_origins: Vec<String>,
    /// Build the pipeline before accepting requests
    pub eager_init: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: Vec::new(),
            eager_init: false,
        }
    }
}

/// Pipeline configuration: everything a rebuild depends on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory scanned for source documents
    pub data_dir: PathBuf,
    /// Directory holding the persisted vector store
    pub db_dir: PathBuf,
    /// Embedding model id (HuggingFace id, or `ollama:<name>`)
    pub embedding_model: String,
    /// Language model id in `provider:model` form
    pub llm_model: String,
    /// Retrieval depth
    pub k_docs: usize,
    /// Maximum chunk length in extended grapheme clusters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in extended grapheme clusters
    pub chunk_overlap: usize,
    /// Glob matched against paths relative to `data_dir`
    pub file_glob: String,
    /// Vector store collection name, suffixed per embedding model on disk
    pub collection: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            db_dir: PathBuf::from("./db"),
            embedding_model: "sentence-transformers/all-mpnet-base-v2".to_string(),
            llm_model: "groq:llama-3.1-8b-instant".to_string(),
            k_docs: 3,
            chunk_size: 1000,
            chunk_overlap: 100,
            file_glob: "*.csv".to_string(),
            collection: "rag_collection".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Return a copy with every field present in `update` replaced
    pub fn merged(&self, update: &ConfigUpdate) -> Self {
        let mut next = self.clone();
        if let Some(data_dir) = &update.data_dir {
            next.data_dir = data_dir.clone();
        }
        if let Some(db_dir) = &update.db_dir {
            next.db_dir = db_dir.clone();
        }
        if let Some(model) = &update.embedding_model {
            next.embedding_model = model.clone();
        }
        if let Some(model) = &update.llm_model {
            next.llm_model = model.clone();
        }
        if let Some(k) = update.k_docs {
            next.k_docs = k;
        }
        if let Some(size) = update.chunk_size {
            next.chunk_size = size;
        }
        if let Some(overlap) = update.chunk_overlap {
            next.chunk_overlap = overlap;
        }
        if let Some(glob) = &update.file_glob {
            next.file_glob = glob.clone();
        }
        next
    }

    /// Check field-level invariants
    pub fn validate(&self) -> Result<()> {
        if self.k_docs == 0 {
            return Err(Error::config("k_docs must be at least 1"));
        }
        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size must be at least 1"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.embedding_model.trim().is_empty() {
            return Err(Error::config("embedding_model must not be empty"));
        }
        if self.llm_model.trim().is_empty() {
            return Err(Error::config("llm_model must not be empty"));
        }
        if self.collection.trim().is_empty() {
            return Err(Error::config("collection must not be empty"));
        }
        glob::Pattern::new(&self.file_glob)
            .map_err(|e| Error::config(format!("Invalid file_glob '{}': {}", self.file_glob, e)))?;
        Ok(())
    }
}

/// Partial pipeline configuration accepted by `/initialize`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub db_dir: Option<PathBuf>,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub llm_model: Option<String>,
    #[serde(default)]
    pub k_docs: Option<usize>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub chunk_overlap: Option<usize>,
    #[serde(default)]
    pub file_glob: Option<String>,
}

/// Model endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub ollama_url: String,
    /// Groq OpenAI-compatible base URL
    pub groq_url: String,
    /// OpenAI base URL
    pub openai_url: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Seconds a model server may stall between reads
    pub timeout_secs: u64,
    /// Cache directory for downloaded embedding models
    pub model_cache_dir: PathBuf,
    /// Batch size for embedding generation
    pub embed_batch_size: usize,
    /// Maximum token sequence length fed to the embedding model
    pub embed_max_length: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            groq_url: "https://api.groq.com/openai/v1".to_string(),
            openai_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.3,
            timeout_secs: 300,
            model_cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("anime-rag")
                .join("models"),
            embed_batch_size: 32,
            embed_max_length: 384,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = PipelineConfig::default();
        assert_eq!(config.embedding_model, "sentence-transformers/all-mpnet-base-v2");
        assert_eq!(config.k_docs, 3);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_keeps_unspecified_fields() {
        let base = PipelineConfig::default();
        let update = ConfigUpdate {
            k_docs: Some(5),
            ..Default::default()
        };

        let merged = base.merged(&update);
        assert_eq!(merged.k_docs, 5);
        assert_eq!(merged.db_dir, base.db_dir);
        assert_eq!(merged.llm_model, base.llm_model);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let config = PipelineConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_update_deserializes_partial_json() {
        let update: ConfigUpdate = serde_json::from_str(r#"{"k_docs": 5, "db_dir": "./x"}"#).unwrap();
        assert_eq!(update.k_docs, Some(5));
        assert_eq!(update.db_dir, Some(PathBuf::from("./x")));
        assert!(update.llm_model.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ANIME_RAG_PORT", "8080"),
            ("ANIME_RAG_K_DOCS", "7"),
            ("ANIME_RAG_LLM_MODEL", "ollama:llama3.2"),
        ]
        .into_iter()
        .collect();

        let mut config = RagConfig::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.pipeline.k_docs, 7);
        assert_eq!(config.pipeline.llm_model, "ollama:llama3.2");
    }

    #[test]
    fn test_bad_env_number_is_config_error() {
        let mut config = RagConfig::default();
        let result = config.apply_env(|key| (key == "ANIME_RAG_K_DOCS").then(|| "many".to_string()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anime-rag.toml");
        std::fs::write(
            &path,
            r#"
[server]
host = "127.0.0.1"
port = 9000

[pipeline]
k_docs = 4
file_glob = "*.txt"
"#,
        )
        .unwrap();

        let config = RagConfig::from_file(&path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.pipeline.k_docs, 4);
        assert_eq!(config.pipeline.file_glob, "*.txt");
        assert_eq!(config.pipeline.chunk_size, 1000);
    }
}
