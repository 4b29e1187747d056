use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by Ollama-style endpoints on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    /// Pulls a short human-readable detail out of a failure body.
    pub fn detail_from(body: &str) -> Option<String> {
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
            return Some(parsed.error);
        }
        let trimmed = body.trim();
        (!trimmed.is_empty()).then(|| trimmed.chars().take(200).collect())
    }
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("API Error: {status}")]
    Status { status: u16, detail: Option<String> },
    #[error("{0}")]
    Transport(String),
    #[error("malformed response body: {0}")]
    Decode(String),
}

impl InferenceError {
    pub fn status(&self) -> Option<u16> {
        match self {
            InferenceError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Text of the assistant-role entry appended when a request fails.
    pub fn conversation_text(&self) -> String {
        format!("Connection error: {self}")
    }
}
