use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use snip_core::ShortenerError;
use thiserror::Error;
use tracing::error;

use crate::model::ErrorResponse;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("url not found")]
    NotFound,
    #[error(transparent)]
    Shortener(#[from] ShortenerError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Shortener(err) => match err {
                ShortenerError::InvalidShortCode(_) | ShortenerError::InvalidExpiration(_) => {
                    StatusCode::BAD_REQUEST
                }
                ShortenerError::CodeUnavailable(_) => StatusCode::CONFLICT,
                ShortenerError::AllocationExhausted { .. } | ShortenerError::Cancelled => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                ShortenerError::Storage(_) | ShortenerError::Cache(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "Request failed");
            match status {
                StatusCode::INTERNAL_SERVER_ERROR => "internal server error".to_string(),
                _ => self.to_string(),
            }
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
