//! Application state for the RAG server

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::{ConfigUpdate, PipelineConfig};
use crate::error::Result;
use crate::pipeline::{Pipeline, PipelineFactory};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Last successfully applied configuration
    config: RwLock<PipelineConfig>,
    /// Active pipeline; swapped whole, never mutated in place
    pipeline: RwLock<Option<Arc<Pipeline>>>,
    /// Serialises rebuilds
    reconfigure: Mutex<()>,
    /// Builds pipelines from configuration
    factory: Arc<dyn PipelineFactory>,
}

impl AppState {
    /// Create state with no pipeline loaded yet
    pub fn new(config: PipelineConfig, factory: Arc<dyn PipelineFactory>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config: RwLock::new(config),
                pipeline: RwLock::new(None),
                reconfigure: Mutex::new(()),
                factory,
            }),
        }
    }

    /// Get configuration
    pub fn config(&self) -> PipelineConfig {
        self.inner.config.read().clone()
    }

    /// Check if a pipeline is loaded
    pub fn is_initialized(&self) -> bool {
        self.inner.pipeline.read().is_some()
    }

    /// Rebuild the pipeline with `update` applied to the current configuration
    ///
    /// The new configuration and pipeline are committed together, and only on
    /// success. Queries running meanwhile keep using the previous pipeline.
    pub async fn initialize(&self, update: &ConfigUpdate) -> Result<Arc<Pipeline>> {
        let _guard = self.inner.reconfigure.lock().await;

        let next = self.config().merged(update);
        let pipeline = Arc::new(self.inner.factory.build(&next).await?);

        *self.inner.pipeline.write() = Some(pipeline.clone());
        *self.inner.config.write() = next;

        tracing::info!("Pipeline initialized");
        Ok(pipeline)
    }

    /// Active pipeline, building one from the current configuration if none exists
    pub async fn pipeline(&self) -> Result<Arc<Pipeline>> {
        if let Some(pipeline) = self.current() {
            return Ok(pipeline);
        }

        let _guard = self.inner.reconfigure.lock().await;
        // Another request may have finished initialising while we waited
        if let Some(pipeline) = self.current() {
            return Ok(pipeline);
        }

        tracing::info!("No pipeline loaded; initializing with current configuration");
        let config = self.config();
        let pipeline = Arc::new(self.inner.factory.build(&config).await?);
        *self.inner.pipeline.write() = Some(pipeline.clone());

        Ok(pipeline)
    }

    fn current(&self) -> Option<Arc<Pipeline>> {
        self.inner.pipeline.read().clone()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::StubFactory;
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn test_initialize_commits_merged_config() {
        let factory = StubFactory::answering(vec![Ok("X")]);
        let state = AppState::new(PipelineConfig::default(), factory.clone());

        let update = ConfigUpdate {
            k_docs: Some(5),
            ..ConfigUpdate::default()
        };
        let pipeline = state.initialize(&update).await.unwrap();

        assert_eq!(pipeline.config.k_docs, 5);
        assert_eq!(state.config().k_docs, 5);
        assert_eq!(factory.built.lock()[0].k_docs, 5);
        assert!(state.is_initialized());
    }

    #[tokio::test]
    async fn test_failed_initialize_keeps_previous_config() {
        let state = AppState::new(PipelineConfig::default(), StubFactory::failing());

        let update = ConfigUpdate {
            k_docs: Some(9),
            ..ConfigUpdate::default()
        };
        assert!(matches!(state.initialize(&update).await, Err(Error::ModelLoad(_))));

        assert_eq!(state.config().k_docs, 3);
        assert!(!state.is_initialized());
    }

    #[tokio::test]
    async fn test_lazy_pipeline_built_once() {
        let factory = StubFactory::answering(vec![Ok("X")]);
        let state = AppState::new(PipelineConfig::default(), factory.clone());

        let (a, b) = tokio::join!(state.pipeline(), state.pipeline());
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(factory.built.lock().len(), 1);
    }
}
