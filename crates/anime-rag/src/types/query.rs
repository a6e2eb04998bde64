//! Query request types

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Query request accepted by `/query` and `/query/stream`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer (`query` and `input_` are accepted from older clients)
    #[serde(default, alias = "query", alias = "input_")]
    pub question: Option<String>,
}

impl QueryRequest {
    /// Create a request for a question
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: Some(question.into()),
        }
    }

    /// Return the trimmed question, rejecting missing or blank input
    pub fn validated_question(&self) -> Result<String> {
        match self.question.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => Ok(q.to_string()),
            _ => Err(Error::validation("No question provided")),
        }
    }
}
