//! HTTP server for the RAG service

pub mod routes;
pub mod state;

use axum::{http::HeaderValue, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{ConfigUpdate, RagConfig, ServerConfig};
use crate::error::{Error, Result};
use crate::pipeline::{DefaultPipelineFactory, PipelineFactory};
use state::AppState;

/// RAG HTTP Server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a server that builds pipelines from disk and the configured models
    pub fn new(config: RagConfig) -> Self {
        let factory = Arc::new(DefaultPipelineFactory::new(config.llm.clone()));
        Self::with_factory(config, factory)
    }

    /// Create a server with a custom pipeline factory
    pub fn with_factory(config: RagConfig, factory: Arc<dyn PipelineFactory>) -> Self {
        let state = AppState::new(config.pipeline.clone(), factory);
        Self { config, state }
    }

    /// Shared state (for tests and embedding)
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all routes
    pub fn router(&self) -> Result<Router> {
        build_router(self.state.clone(), &self.config.server)
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::config(format!("Invalid address: {}", e)))?;

        let router = self.router()?;

        if self.config.server.eager_init {
            tracing::info!("Building pipeline before accepting requests");
            self.state.initialize(&ConfigUpdate::default()).await?;
        }

        tracing::info!("Starting RAG server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Routes plus CORS and request tracing
pub fn build_router(state: AppState, server: &ServerConfig) -> Result<Router> {
    Ok(Router::new()
        .route("/health", get(health_check))
        .merge(routes::api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&server.cors_origins)?))
}

/// Any origin when `origins` is empty, otherwise exactly the listed ones
fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let values = origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o)
                    .map_err(|e| Error::config(format!("Invalid CORS origin '{}': {}", o, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(values)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::server::state::test_support::StubFactory;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn router(origins: Vec<String>) -> Router {
        let state = AppState::new(PipelineConfig::default(), StubFactory::answering(vec![Ok("X")]));
        let server = ServerConfig {
            cors_origins: origins,
            ..ServerConfig::default()
        };
        build_router(state, &server).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router(Vec::new())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let response = router(vec!["http://localhost:3000".to_string()])
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
    }

    #[test]
    fn test_invalid_cors_origin_rejected() {
        assert!(matches!(cors_layer(&["bad\norigin".to_string()]), Err(Error::Config(_))));
    }
}
