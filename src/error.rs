//! Error types for firm
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// This enum represents all possible errors that can occur
/// in the application. It implements `IntoResponse` to
/// automatically convert errors to appropriate HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Authentication required (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Credentials were presented but malformed (400)
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// Access denied (403)
    #[error("{0}")]
    Forbidden(String),

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Method not allowed on this resource (405)
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Store error (500)
    #[error("Store error: {0}")]
    Store(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP client error (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Federation error (502)
    #[error("Federation error: {0}")]
    Federation(String),

    /// Signature verification failed (401)
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),

    /// Not implemented (501)
    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Status code for this error, independent of response shaping.
///
/// Exposed so the authorization engine can build an
/// `AuthorizationDecision` without going through `IntoResponse`.
impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::AuthenticationError(_) => StatusCode::BAD_REQUEST,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::Federation(_) => StatusCode::BAD_GATEWAY,
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status_code();
        let error_type = match &self {
            AppError::NotFound => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidSignature(_) => "invalid_signature",
            AppError::Forbidden(_) => "forbidden",
            AppError::Validation(_) => "validation",
            AppError::AuthenticationError(_) => "authentication_error",
            AppError::MethodNotAllowed => "method_not_allowed",
            AppError::NotImplemented(_) => "not_implemented",
            AppError::Federation(_) => "federation",
            AppError::HttpClient(_) => "http_client",
            AppError::Database(_) => "database",
            AppError::Store(_) => "store",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        };

        let error_message = match &self {
            // Don't leak internal details for 5xx-class errors.
            AppError::Database(_) => "Database error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
