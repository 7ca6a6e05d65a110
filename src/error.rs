use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
///
/// Authorization outcomes (malformed, unknown, expired or tampered sessions) are never
/// represented here; they resolve to "no session". What remains are infrastructure
/// failures and caller mistakes.
#[derive(Error, Debug)]
pub enum AppError {
    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file store snapshot could not be encoded or decoded.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// An encryption error.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// A value could not be serialized before encryption.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An authorization error.
    #[error("Authorization failed")]
    Unauthorized,

    /// A resource not found error.
    #[error("Resource not found")]
    NotFound,
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Returns `true` for failures of the backing store, which callers may retry.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            AppError::Redis(_) | AppError::Io(_) | AppError::Snapshot(_)
        )
    }
}

impl From<bincode::error::EncodeError> for AppError {
    fn from(e: bincode::error::EncodeError) -> Self {
        AppError::Snapshot(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for AppError {
    fn from(e: bincode::error::DecodeError) -> Self {
        AppError::Snapshot(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Redis(ref e) => {
                tracing::error!("Redis error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Session store unavailable".to_string())
            }

            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Session store unavailable".to_string())
            }

            AppError::Snapshot(ref msg) => {
                tracing::error!("Snapshot error: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Session store unavailable".to_string())
            }

            AppError::Encryption(ref msg) => {
                tracing::error!("Encryption error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Encryption error".to_string())
            }

            AppError::Serialization(ref msg) => {
                tracing::error!("Serialization error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Serialization error".to_string())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Unauthorized => {
                tracing::warn!("Authorization failed");
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }

            AppError::NotFound => {
                tracing::debug!("Resource not found");
                (StatusCode::NOT_FOUND, "Resource not found".to_string())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}
