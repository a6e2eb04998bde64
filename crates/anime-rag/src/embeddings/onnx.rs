//! ONNX-based sentence-transformers embeddings
//!
//! Loads a HuggingFace sentence-transformers export (e.g.
//! `sentence-transformers/all-mpnet-base-v2`) and produces mean-pooled,
//! L2-normalised vectors. Inference is deterministic for a fixed model.

use async_trait::async_trait;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::Tokenizer;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::EmbeddingProvider;

const HF_BASE_URL: &str = "https://huggingface.co";

/// Loaded model shared with blocking inference tasks
struct OnnxModel {
    /// ONNX Runtime session
    session: Mutex<Session>,
    /// HuggingFace tokenizer
    tokenizer: Tokenizer,
    /// Whether the graph takes a `token_type_ids` input (BERT yes, MPNet no)
    uses_token_type_ids: bool,
    /// Maximum sequence length
    max_length: usize,
}

/// ONNX-based text embedder
pub struct OnnxEmbedder {
    model: Arc<OnnxModel>,
    dimensions: usize,
    batch_size: usize,
}

impl OnnxEmbedder {
    /// Download (if needed) and load a model by HuggingFace id
    pub async fn load(model_id: &str, config: &LlmConfig) -> Result<Self> {
        tracing::info!("Initializing ONNX embedder with model: {}", model_id);

        let cache_dir = model_cache_dir(&config.model_cache_dir, model_id);
        tokio::fs::create_dir_all(&cache_dir).await.map_err(|e| {
            Error::model_load(format!("Failed to create cache directory {}: {}", cache_dir.display(), e))
        })?;

        let model_path = cache_dir.join("model.onnx");
        let tokenizer_path = cache_dir.join("tokenizer.json");

        if !model_path.exists() {
            download(model_id, "onnx/model.onnx", &model_path).await?;
        }
        if !tokenizer_path.exists() {
            download(model_id, "tokenizer.json", &tokenizer_path).await?;
        }

        let max_length = config.embed_max_length;
        let model = tokio::task::spawn_blocking(move || {
            OnnxModel::from_files(&model_path, &tokenizer_path, max_length)
        })
        .await
        .map_err(|e| Error::internal(format!("Task join error: {}", e)))??;

        let model = Arc::new(model);

        // Embed once to learn the output width and prove the graph runs
        let sample = {
            let model = Arc::clone(&model);
            tokio::task::spawn_blocking(move || model.embed(&["dimension check".to_string()]))
                .await
                .map_err(|e| Error::internal(format!("Task join error: {}", e)))?
                .map_err(|e| Error::model_load(format!("Model {} failed to run: {}", model_id, e)))?
        };
        let dimensions = sample.first().map(Vec::len).unwrap_or(0);
        if dimensions == 0 {
            return Err(Error::model_load(format!("Model {} produced empty embeddings", model_id)));
        }

        tracing::info!("ONNX embedder initialized ({} dimensions)", dimensions);

        Ok(Self {
            model,
            dimensions,
            batch_size: config.embed_batch_size.max(1),
        })
    }

    async fn run(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let batch_size = self.batch_size;

        tokio::task::spawn_blocking(move || {
            let mut all = Vec::with_capacity(texts.len());
            for batch in texts.chunks(batch_size) {
                all.extend(model.embed(batch)?);
            }
            Ok(all)
        })
        .await
        .map_err(|e| Error::internal(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl EmbeddingProvider for OnnxEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.run(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("Empty embedding result"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run(texts.to_vec()).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

impl OnnxModel {
    fn from_files(model_path: &Path, tokenizer_path: &Path, max_length: usize) -> Result<Self> {
        let session = Session::builder()
            .map_err(|e| Error::model_load(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::model_load(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(4)
            .map_err(|e| Error::model_load(format!("Failed to set threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| Error::model_load(format!("Failed to load model: {}", e)))?;

        let uses_token_type_ids = session.inputs.iter().any(|i| i.name == "token_type_ids");

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| Error::model_load(format!("Failed to load tokenizer: {}", e)))?;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            uses_token_type_ids,
            max_length,
        })
    }

    /// Embed one batch
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch_size = texts.len();
        if batch_size == 0 {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::embedding(format!("Tokenization failed: {}", e)))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(self.max_length)
            .max(1);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();

            for j in 0..ids.len().min(max_len) {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
                token_type_ids[i * max_len + j] = types[j] as i64;
            }
        }

        let shape = vec![batch_size, max_len];
        let input_ids_tensor = Tensor::from_array((shape.clone(), input_ids.into_boxed_slice()))
            .map_err(|e| Error::embedding(format!("Input tensor creation failed: {}", e)))?;
        let attention_mask_tensor =
            Tensor::from_array((shape.clone(), attention_mask.clone().into_boxed_slice()))
                .map_err(|e| Error::embedding(format!("Attention mask tensor creation failed: {}", e)))?;

        let mut inputs = vec![
            ("input_ids", input_ids_tensor.into_dyn()),
            ("attention_mask", attention_mask_tensor.into_dyn()),
        ];
        if self.uses_token_type_ids {
            let token_type_tensor = Tensor::from_array((shape, token_type_ids.into_boxed_slice()))
                .map_err(|e| Error::embedding(format!("Token type tensor creation failed: {}", e)))?;
            inputs.push(("token_type_ids", token_type_tensor.into_dyn()));
        }

        let mut session = self.session.lock();
        let outputs = session
            .run(inputs)
            .map_err(|e| Error::embedding(format!("Inference failed: {}", e)))?;

        let output_iter: Vec<_> = outputs.iter().collect();
        let output = output_iter
            .iter()
            .find(|(name, _)| *name == "last_hidden_state")
            .or_else(|| output_iter.first())
            .map(|(_, v)| v)
            .ok_or_else(|| Error::embedding("No output tensor"))?;

        let (tensor_shape, tensor_data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::embedding(format!("Failed to extract tensor: {}", e)))?;

        let dims: Vec<usize> = tensor_shape.iter().map(|&d| d as usize).collect();
        let hidden_size = dims
            .get(2)
            .copied()
            .ok_or_else(|| Error::embedding(format!("Unexpected output shape {:?}", dims)))?;

        Ok((0..batch_size)
            .map(|i| {
                let mask = &attention_mask[i * max_len..(i + 1) * max_len];
                let tokens = &tensor_data[i * max_len * hidden_size..(i + 1) * max_len * hidden_size];
                mean_pool(tokens, mask, hidden_size)
            })
            .collect())
    }
}

/// Attention-masked mean pooling followed by L2 normalisation
fn mean_pool(tokens: &[f32], mask: &[i64], hidden_size: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden_size];
    let mut count = 0.0f32;

    for (token, &m) in tokens.chunks(hidden_size).zip(mask) {
        if m > 0 {
            for (acc, value) in sum.iter_mut().zip(token) {
                *acc += value;
            }
            count += 1.0;
        }
    }

    if count > 0.0 {
        for val in &mut sum {
            *val /= count;
        }
    }

    let norm: f32 = sum.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in &mut sum {
            *val /= norm;
        }
    }

    sum
}

/// Cache directory for one model id (`org/name` becomes `org--name`)
fn model_cache_dir(root: &Path, model_id: &str) -> PathBuf {
    root.join(model_id.replace('/', "--"))
}

/// Download one file of a HuggingFace repository
async fn download(model_id: &str, file: &str, path: &Path) -> Result<()> {
    let url = format!("{}/{}/resolve/main/{}", HF_BASE_URL, model_id, file);
    tracing::info!("Downloading {} from: {}", file, url);

    let response = reqwest::get(&url)
        .await
        .map_err(|e| Error::model_load(format!("Failed to download {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(Error::model_load(format!(
            "Model {} is unavailable: HTTP {} for {}",
            model_id,
            response.status(),
            file
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::model_load(format!("Failed to read {}: {}", url, e)))?;

    // Write then rename so an interrupted download never looks cached
    let partial = path.with_extension("part");
    tokio::fs::write(&partial, &bytes).await?;
    tokio::fs::rename(&partial, path).await?;

    tracing::info!("Downloaded {} ({} bytes)", file, bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_pool_ignores_padding_and_normalizes() {
        // Two real tokens and one padding token, hidden size 2
        let tokens = [3.0, 0.0, 1.0, 0.0, 100.0, 100.0];
        let mask = [1, 1, 0];

        let pooled = mean_pool(&tokens, &mask, 2);
        assert_eq!(pooled, vec![1.0, 0.0]);
    }

    #[test]
    fn test_mean_pool_is_deterministic() {
        let tokens: Vec<f32> = (0..12).map(|i| i as f32 * 0.37).collect();
        let mask = [1, 1, 1, 0];
        assert_eq!(mean_pool(&tokens, &mask, 3), mean_pool(&tokens, &mask, 3));
    }

    #[test]
    fn test_model_cache_dir_flattens_id() {
        let dir = model_cache_dir(Path::new("/cache"), "sentence-transformers/all-mpnet-base-v2");
        assert_eq!(dir, PathBuf::from("/cache/sentence-transformers--all-mpnet-base-v2"));
    }
}
