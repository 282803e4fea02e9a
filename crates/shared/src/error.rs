use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Unavailable,
    #[default]
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::Validation,
            404 => Self::NotFound,
            502..=504 => Self::Unavailable,
            _ => Self::Internal,
        }
    }
}

/// Error body returned by the detection and catalog services.
///
/// The services answer failures with `{"error": "..."}`; the code is
/// optional on the wire and derived from the HTTP status when absent.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    #[serde(default)]
    pub code: ErrorCode,
    #[serde(alias = "error")]
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Decodes an error body, falling back to the raw text when it is not JSON.
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ApiError>(body) {
            Ok(mut parsed) => {
                if parsed.code == ErrorCode::Internal {
                    parsed.code = ErrorCode::from_status(status);
                }
                parsed
            }
            Err(_) => {
                let trimmed = body.trim();
                let message = if trimmed.is_empty() {
                    format!("HTTP {status}")
                } else {
                    trimmed.to_string()
                };
                Self::new(ErrorCode::from_status(status), message)
            }
        }
    }
}
