//! Request-level error type and its HTTP mapping.

use axum::http::StatusCode;
use thiserror::Error;

use crate::third_party::GenerationError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("missing J-Novel Club credentials: {field} is not set in the request or environment")]
    Configuration { field: &'static str },
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("packaging failed: {0}")]
    Packaging(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Configuration { .. } => StatusCode::UNAUTHORIZED,
            Self::Generation(e) => match e {
                GenerationError::Auth(_) => StatusCode::UNAUTHORIZED,
                GenerationError::PaymentRequired(_) => StatusCode::FORBIDDEN,
                GenerationError::NotFound(_) => StatusCode::NOT_FOUND,
                GenerationError::Range(_) => StatusCode::BAD_REQUEST,
                GenerationError::Network(_) | GenerationError::Failed { .. } => {
                    StatusCode::BAD_GATEWAY
                }
                GenerationError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                GenerationError::Launch(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Packaging(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text shown to the requester. Internal details stay in the log.
    pub fn user_message(&self) -> String {
        match self {
            Self::Generation(GenerationError::PaymentRequired(_)) => {
                "You do not have permission to download this book.".to_string()
            }
            Self::Generation(GenerationError::Launch(_)) => {
                "The EPUB generator is not available on this server.".to_string()
            }
            Self::Generation(GenerationError::Failed { .. }) => {
                "EPUB generation failed.".to_string()
            }
            Self::Packaging(_) | Self::Internal(_) => {
                "Could not prepare the download.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Packaging(err.to_string())
    }
}

impl From<zip::result::ZipError> for PipelineError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Packaging(err.to_string())
    }
}
