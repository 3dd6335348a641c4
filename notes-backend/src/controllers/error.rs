use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use notes_types::ErrorResponse;
use thiserror::Error;

use crate::db::StoreError;
use crate::models::ValidationError;

/// Every failure an API handler can return. Rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Body could not be parsed into the expected shape
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("Note not found")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl ApiError {
    /// Log a storage failure with what was being attempted, then wrap it
    pub fn storage(action: &str, err: StoreError) -> Self {
        log::error!("[NOTES] Error {}: {}", action, err);
        Self::Storage(err)
    }

    /// Map a failure to read the raw request body, keeping 413 for overflow
    pub fn from_body_error(err: &actix_web::Error) -> Self {
        if err.as_response_error().status_code() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(err.to_string())
        } else {
            Self::InvalidBody(err.to_string())
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(self.to_string()))
    }
}
