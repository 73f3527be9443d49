use crate::services::form_service::FormError;
use crate::staging::StagingError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    /// A hosted collaborator (storage or record store) failed
    #[error("Upstream failure: {0}")]
    BadGateway(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl From<StagingError> for AppError {
    fn from(err: StagingError) -> Self {
        let message = err.to_string();
        match err {
            StagingError::CapacityExceeded { .. }
            | StagingError::IndexOutOfRange { .. }
            | StagingError::InvalidFile(_) => AppError::BadRequest(message),
            StagingError::UploadFailure { .. } => AppError::BadGateway(message),
            StagingError::MissingOwner => AppError::Unauthorized(message),
            StagingError::Preview(_) => AppError::Internal(message),
        }
    }
}

impl From<FormError> for AppError {
    fn from(err: FormError) -> Self {
        let message = err.to_string();
        match err {
            FormError::Staging(e) => e.into(),
            FormError::Validation(_) | FormError::KindMismatch { .. } => {
                AppError::BadRequest(message)
            }
            FormError::RecordWriteFailure(detail) | FormError::RecordReadFailure(detail) => {
                tracing::error!("Record store failure: {}", detail);
                AppError::BadGateway(message)
            }
            FormError::RecordNotFound(_) | FormError::SessionNotFound => {
                AppError::NotFound(message)
            }
            FormError::SessionClosed
            | FormError::SubmitInProgress
            | FormError::SubmitDiscarded => AppError::Conflict(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Anyhow(e) => {
                tracing::error!("Anyhow error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
