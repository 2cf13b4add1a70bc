//! Error types
//!
//! [`Error`] covers failures of the primitives' own machinery. Failures of
//! caller-supplied operations are never wrapped: they travel inside the
//! operation's output. [`ApiError`] is the error type of the demo HTTP service.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tokio::task::JoinError;

use crate::models::ErrorResponse;

// == Library Error ==
/// Failure of a spawned operation that prevented it from producing an output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The operation panicked while running
    #[error("Operation panicked: {0}")]
    Panicked(String),

    /// The operation was dropped before settling (runtime shutdown)
    #[error("Operation cancelled before settling")]
    Cancelled,
}

impl From<JoinError> for Error {
    fn from(err: JoinError) -> Self {
        if err.is_panic() {
            let payload = err.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Error::Panicked(message)
        } else {
            Error::Cancelled
        }
    }
}

// == API Error Enum ==
/// Error type returned by the demo service handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// No data exists for the requested item
    #[error("Item not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Another operation already holds the item
    #[error("Item locked: {0}")]
    Conflict(String),

    /// The job runner has no free slot
    #[error("Busy: {0}")]
    Busy(String),

    /// The upstream source failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Busy(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the demo service.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_panic_maps_to_panicked() {
        let handle: tokio::task::JoinHandle<()> = tokio::spawn(async {
            panic!("boom");
        });
        let err = Error::from(handle.await.unwrap_err());
        assert_eq!(err, Error::Panicked("boom".to_string()));
    }

    #[tokio::test]
    async fn test_abort_maps_to_cancelled() {
        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        let err = Error::from(handle.await.unwrap_err());
        assert_eq!(err, Error::Cancelled);
    }

    #[test]
    fn test_api_error_status_codes() {
        let cases = [
            (ApiError::NotFound("a".into()), StatusCode::NOT_FOUND),
            (ApiError::InvalidRequest("a".into()), StatusCode::BAD_REQUEST),
            (ApiError::Conflict("a".into()), StatusCode::CONFLICT),
            (ApiError::Busy("a".into()), StatusCode::TOO_MANY_REQUESTS),
            (ApiError::Upstream("a".into()), StatusCode::BAD_GATEWAY),
            (ApiError::Internal("a".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
