use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: uploads are limited to {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    /// The blob-store write failed; nothing was changed.
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// The blob-store delete failed; nothing was changed.
    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    /// The blob was written but its record was not. The blob is orphaned.
    #[error("Metadata write failed for {container}/{key}: {detail}")]
    MetadataWriteFailed {
        container: String,
        key: String,
        detail: String,
    },

    /// The blob was deleted but its record was not. The record dangles.
    #[error("Metadata delete failed for record {id}: {detail}")]
    MetadataDeleteFailed { id: i64, detail: String },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-checkable error kind surfaced to API callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Validation,
    PayloadTooLarge,
    NotFound,
    UploadFailed,
    DeleteFailed,
    MetadataWriteFailed,
    MetadataDeleteFailed,
    ConstraintViolation,
    Storage,
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::UploadFailed(_) => ErrorKind::UploadFailed,
            AppError::DeleteFailed(_) => ErrorKind::DeleteFailed,
            AppError::MetadataWriteFailed { .. } => ErrorKind::MetadataWriteFailed,
            AppError::MetadataDeleteFailed { .. } => ErrorKind::MetadataDeleteFailed,
            AppError::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            AppError::Storage(_) => ErrorKind::Storage,
            AppError::Database(_) | AppError::Io(_) | AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::PayloadTooLarge => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::ConstraintViolation => StatusCode::CONFLICT,
            ErrorKind::UploadFailed
            | ErrorKind::DeleteFailed
            | ErrorKind::MetadataWriteFailed
            | ErrorKind::MetadataDeleteFailed
            | ErrorKind::Storage => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: ErrorKind,
    pub detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (error, detail) = match &self {
            AppError::Validation(msg) => (msg.clone(), msg.clone()),
            AppError::PayloadTooLarge { .. } => ("Payload too large".to_string(), self.to_string()),
            AppError::NotFound(msg) => ("Not found".to_string(), msg.clone()),
            AppError::UploadFailed(msg) => ("Upload failed".to_string(), msg.clone()),
            AppError::DeleteFailed(msg) => ("Delete failed".to_string(), msg.clone()),
            AppError::MetadataWriteFailed { .. } => {
                ("Metadata write failed".to_string(), self.to_string())
            }
            AppError::MetadataDeleteFailed { .. } => {
                ("Metadata delete failed".to_string(), self.to_string())
            }
            AppError::ConstraintViolation(msg) => ("Constraint violation".to_string(), msg.clone()),
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                ("Storage error".to_string(), msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                ("Database error".to_string(), e.to_string())
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {:?}", e);
                ("IO error".to_string(), e.to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ("Server error".to_string(), msg.clone())
            }
        };

        let body = ErrorBody {
            error,
            kind: self.kind(),
            detail,
        };
        (self.status(), Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
