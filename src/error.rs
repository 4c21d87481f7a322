use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{models::ErrorMessage, payments::PaymentError, repository::RepositoryError};

/// AppError
///
/// Every failure a handler or the access gate can produce. Converted into a status code
/// and a `{ "message": ... }` body; store and provider details go to the log, not the client.
#[derive(Debug, Error)]
pub enum AppError {
    /// No credential was presented.
    #[error("Unauthorized access")]
    Unauthorized,

    /// The credential is invalid, or the caller fails an authorization check.
    #[error("Forbidden access")]
    Forbidden,

    #[error("Resource not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Repository(_) | AppError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Payment(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Repository(e) => {
                tracing::error!(error = %e, "repository failure");
                "Internal server error".to_string()
            }
            AppError::Token(e) => {
                tracing::error!(error = %e, "token signing failure");
                "Internal server error".to_string()
            }
            AppError::Payment(e) => {
                tracing::warn!(error = %e, "payment provider failure");
                "Payment provider error".to_string()
            }
            other => other.to_string(),
        };

        (self.status(), Json(ErrorMessage { message })).into_response()
    }
}
