//! Pipeline (re)configuration endpoints

use axum::{body::Bytes, extract::State, Json};

use crate::config::ConfigUpdate;
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{ConfigResponse, StatusResponse};

/// POST /initialize - Rebuild the pipeline with the given overrides
///
/// An empty body rebuilds with the current configuration.
pub async fn initialize(State(state): State<AppState>, body: Bytes) -> Result<Json<StatusResponse>> {
    let update = parse_update(&body)?;

    tracing::info!("Initializing pipeline with {:?}", update);
    let pipeline = state.initialize(&update).await?;

    Ok(Json(StatusResponse::success(format!(
        "RAG pipeline initialized (llm: {}, k: {})",
        pipeline.config.llm_model, pipeline.config.k_docs
    ))))
}

/// GET /config - Active configuration
pub async fn config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        status: "success".to_string(),
        initialized: state.is_initialized(),
        config: state.config(),
    })
}

fn parse_update(body: &[u8]) -> Result<ConfigUpdate> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ConfigUpdate::default());
    }
    serde_json::from_slice(body).map_err(|e| Error::validation(format!("Invalid request body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_is_empty_update() {
        let update = parse_update(b"  ").unwrap();
        assert!(update.k_docs.is_none() && update.llm_model.is_none());
    }

    #[test]
    fn test_partial_update_parsed() {
        let update = parse_update(br#"{"k_docs": 5, "llm_model": "ollama:llama3.2"}"#).unwrap();
        assert_eq!(update.k_docs, Some(5));
        assert_eq!(update.llm_model.as_deref(), Some("ollama:llama3.2"));
        assert!(update.data_dir.is_none());
    }

    #[test]
    fn test_malformed_body_is_validation_error() {
        assert!(matches!(parse_update(b"{k_docs"), Err(Error::Validation(_))));
    }
}
