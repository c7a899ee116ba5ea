//! Error types for the API service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::scanner::ScanError;
use crate::verification::VerifyError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("Internal server error")]
    InternalServerError,

    #[error("Database error: {0}")]
    Database(#[from] common::error::DatabaseError),
}

impl ApiError {
    /// Log the cause and hide it from the client
    pub fn internal(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        ApiError::InternalServerError
    }

    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::Scan(e) => {
                let status = match e {
                    ScanError::InvalidFormat => StatusCode::BAD_REQUEST,
                    ScanError::WrongEvent { .. } => StatusCode::CONFLICT,
                    ScanError::AttendeeNotFound => StatusCode::NOT_FOUND,
                    ScanError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let message = match e {
                    ScanError::Store(_) => "Internal server error".to_string(),
                    other => other.to_string(),
                };
                (status, e.code(), message)
            }
            ApiError::Verify(e) => {
                let status = match e {
                    VerifyError::MissingFields | VerifyError::InvalidCode => {
                        StatusCode::BAD_REQUEST
                    }
                    VerifyError::TokenMismatch | VerifyError::UnknownPass => StatusCode::NOT_FOUND,
                    VerifyError::EmailMismatch => StatusCode::FORBIDDEN,
                    VerifyError::PassNotGenerated => StatusCode::CONFLICT,
                    VerifyError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let message = match e {
                    VerifyError::Store(_) => "Verification system error. Please try again.".to_string(),
                    other => other.to_string(),
                };
                (status, e.code(), message)
            }
            ApiError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "Internal server error".to_string(),
            ),
            ApiError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE",
                "Database error".to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Database(e) = &self {
            error!("Database error: {}", e);
        }
        if let ApiError::Scan(ScanError::Store(e)) = &self {
            error!("Scan store error: {}", e);
        }
        if let ApiError::Verify(VerifyError::Store(e)) = &self {
            error!("Verification store error: {}", e);
        }

        let (status, code, message) = self.parts();
        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
