//! Error types for the ingestion service
//!
//! Errors are converted to consistent HTTP responses through the shared
//! [`error_handling::ErrorResponse`] wire format.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use error_handling::ErrorResponse;
use std::fmt;

/// Result type for ingestion-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Database operation failed
    DatabaseError(String),

    /// Queue operation failed
    QueueError(String),

    /// Object storage operation failed
    StorageError(String),

    /// Validation failed
    ValidationError(String),

    /// Resource not found
    NotFound(String),

    /// Unauthorized access
    Unauthorized(String),

    /// Internal server error
    Internal(String),

    /// Bad request
    BadRequest(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::QueueError(msg) => write!(f, "Queue error: {}", msg),
            AppError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_)
            | AppError::QueueError(_)
            | AppError::StorageError(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ValidationError(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let (error_type, code) = match self {
            AppError::DatabaseError(_) => ("server_error", "DATABASE_ERROR"),
            AppError::QueueError(_) => ("server_error", "QUEUE_ERROR"),
            AppError::StorageError(_) => ("server_error", "STORAGE_ERROR"),
            AppError::ValidationError(_) => ("validation_error", "VALIDATION_ERROR"),
            AppError::NotFound(_) => ("not_found_error", "VIDEO_NOT_FOUND"),
            AppError::Unauthorized(_) => ("authentication_error", "INVALID_CREDENTIALS"),
            AppError::Internal(_) => ("server_error", "INTERNAL_SERVER_ERROR"),
            AppError::BadRequest(_) => ("validation_error", "INVALID_REQUEST"),
        };

        let message = self.to_string();
        let response = ErrorResponse {
            error: match status {
                StatusCode::BAD_REQUEST => "Bad Request",
                StatusCode::UNAUTHORIZED => "Unauthorized",
                StatusCode::NOT_FOUND => "Not Found",
                StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error",
                _ => "Error",
            }
            .to_string(),
            message,
            status: status.as_u16(),
            error_type: error_type.to_string(),
            code: code.to_string(),
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        HttpResponse::build(status).json(response)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Video not found".to_string()),
            _ => AppError::DatabaseError(err.to_string()),
        }
    }
}

impl From<job_queue::QueueError> for AppError {
    fn from(err: job_queue::QueueError) -> Self {
        AppError::QueueError(err.to_string())
    }
}

impl From<object_store::StoreError> for AppError {
    fn from(err: object_store::StoreError) -> Self {
        match err {
            object_store::StoreError::InvalidFileFormat(name) => {
                AppError::ValidationError(format!("invalid file format: {name}"))
            }
            object_store::StoreError::InvalidContentType(ct) => {
                AppError::ValidationError(format!("invalid content type: {ct}"))
            }
            other => AppError::StorageError(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}
