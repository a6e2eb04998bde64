//! Response payloads

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;

/// Generic `{status, message}` acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    /// Successful acknowledgement
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }

    /// Failure report, also used as the terminal `error` stream event
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

/// Answer to a non-streaming query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status: String,
    pub response: String,
}

impl QueryResponse {
    /// Successful answer
    pub fn success(response: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            response: response.into(),
        }
    }
}

/// Payload of a `token` stream event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEvent {
    pub content: String,
}

/// Current service configuration as reported by `/config`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub status: String,
    /// Whether a pipeline is currently loaded
    pub initialized: bool,
    pub config: PipelineConfig,
}
