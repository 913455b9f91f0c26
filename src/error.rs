//! HTTP-surface error type
//!
//! Maps every failure the handlers can produce to a status code and a
//! `{error, code}` JSON body.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::engine::EngineError;

/// Errors surfaced by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Upload error: {0}")]
    Multipart(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::SessionNotFound(_) | Self::FileNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) | Self::UnsupportedFileType(_) | Self::Multipart(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Engine(EngineError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Engine(EngineError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Engine(EngineError::UnsupportedInput(_)) => StatusCode::BAD_REQUEST,
            Self::Engine(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::FileNotFound(_) => "FILE_NOT_FOUND",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::UnsupportedFileType(_) => "UNSUPPORTED_FILE_TYPE",
            Self::Multipart(_) => "UPLOAD_ERROR",
            Self::Engine(EngineError::Unavailable(_)) => "ENGINE_UNAVAILABLE",
            Self::Engine(EngineError::Timeout(_)) => "ENGINE_TIMEOUT",
            Self::Engine(_) => "ENGINE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        });
        (status, body).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result type alias for handler code.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            AppError::SessionNotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::InvalidRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Engine(EngineError::Timeout(300)).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            AppError::Engine(EngineError::Unavailable("marker".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
