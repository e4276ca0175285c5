use axum::{
    body::Body,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use uuid::Uuid;

use crate::common::response::ApiError;
use crate::infrastructure::storage::StorageError;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("The uploaded file is not a video (content type: {0})")]
    NotAVideo(String),

    #[error("Video size exceeds the limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Ad {0} not found")]
    AdNotFound(i64),

    #[error("Media asset {0} not found")]
    AssetNotFound(Uuid),

    #[error("No video field found in multipart request")]
    MissingVideoField,

    #[error("Request body exceeds the upload limit")]
    BodyTooLarge,

    #[error("Malformed multipart request: {0}")]
    Multipart(String),

    #[error("Failed to stage upload: {0}")]
    Staging(#[source] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Repository(#[from] anyhow::Error),
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        let status = match &err {
            MediaError::Validation(ValidationError::NotAVideo(_)) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            MediaError::Validation(ValidationError::TooLarge { .. }) | MediaError::BodyTooLarge => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            MediaError::AdNotFound(_) | MediaError::AssetNotFound(_) => StatusCode::NOT_FOUND,
            MediaError::MissingVideoField | MediaError::Multipart(_) => StatusCode::BAD_REQUEST,
            MediaError::Staging(_) | MediaError::Storage(_) | MediaError::Repository(_) => {
                tracing::error!("Media request failed: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ApiError(err.to_string(), status)
    }
}

impl IntoResponse for MediaError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Media not found: {0}")]
    NotFound(String),

    #[error("Malformed Range header: {0}")]
    BadRange(String),

    #[error("Requested range not satisfiable")]
    Unsatisfiable { length: u64 },

    #[error("Failed to stream media: {0}")]
    Internal(String),
}

impl From<StorageError> for DeliveryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) | StorageError::InvalidKey(key) => DeliveryError::NotFound(key),
            other => DeliveryError::Internal(other.to_string()),
        }
    }
}

impl From<std::io::Error> for DeliveryError {
    fn from(err: std::io::Error) -> Self {
        DeliveryError::Internal(err.to_string())
    }
}

impl IntoResponse for DeliveryError {
    fn into_response(self) -> Response {
        match self {
            DeliveryError::Unsatisfiable { length } => Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{}", length))
                .body(Body::empty())
                .unwrap_or_else(|_| StatusCode::RANGE_NOT_SATISFIABLE.into_response()),
            DeliveryError::NotFound(_) => ApiError(self.to_string(), StatusCode::NOT_FOUND).into_response(),
            DeliveryError::BadRange(_) => ApiError(self.to_string(), StatusCode::BAD_REQUEST).into_response(),
            DeliveryError::Internal(_) => {
                tracing::error!("{}", self);
                ApiError(self.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
            }
        }
    }
}
