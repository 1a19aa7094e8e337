//! Error types for the Fichas server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::ocr::OcrError;
use crate::records::RecordError;
use crate::storage::StorageError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Pipeline error taxonomy
#[derive(Error, Debug)]
pub enum FichaError {
    /// Image bytes could not be parsed (or cannot be split)
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// Batch precondition violated; raised before any work starts
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Text extraction failed for {id}: {source}")]
    Extraction {
        id: String,
        #[source]
        source: OcrError,
    },

    #[error("Upload failed: {0}")]
    Upload(#[from] StorageError),

    #[error("Record creation failed: {0}")]
    RecordCreate(#[from] RecordError),
}

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Another operation is running: {0}")]
    Busy(String),

    #[error(transparent)]
    Ficha(#[from] FichaError),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Busy(op) => (
                StatusCode::CONFLICT,
                "busy",
                format!("Operation already in progress: {}", op),
            ),
            AppError::Ficha(e) => match e {
                FichaError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
                }
                FichaError::Decode(msg) => (StatusCode::BAD_REQUEST, "decode_error", msg.clone()),
                FichaError::Encode(msg) => {
                    tracing::error!("Encode error: {}", msg);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "encode_error",
                        "Failed to encode image".to_string(),
                    )
                }
                FichaError::Extraction { .. } => {
                    tracing::warn!("Extraction error: {}", e);
                    (StatusCode::BAD_GATEWAY, "extraction_error", e.to_string())
                }
                FichaError::Upload(err) => {
                    tracing::error!("Upload error: {}", err);
                    (StatusCode::BAD_GATEWAY, "upload_error", err.to_string())
                }
                FichaError::RecordCreate(err) => {
                    tracing::error!("Record create error: {}", err);
                    (StatusCode::BAD_GATEWAY, "record_error", err.to_string())
                }
            },
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = vec![
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Busy("split".into()), StatusCode::CONFLICT),
            (
                AppError::Ficha(FichaError::Validation("odd".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Ficha(FichaError::Extraction {
                    id: "ficha-0-0".into(),
                    source: OcrError::ProcessingError("boom".into()),
                }),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
