//! Error types for the cache gateway
//!
//! Provides unified error handling using thiserror.
//!
//! Two layers of errors exist:
//! - [`GatewayError`] is what the request layer sees. Only compute failures
//!   from the wrapped collaborators (and malformed requests) end up here.
//! - [`StoreError`] is internal to the caching layer. Every variant is
//!   recovered locally (treated as a miss, or the write is skipped).

use std::fmt;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Shared Error ==
/// A collaborator failure that can be handed to several waiters at once.
///
/// The underlying `anyhow::Error` is kept intact so callers see the
/// collaborator's own message and source chain.
#[derive(Clone)]
pub struct SharedError(Arc<anyhow::Error>);

impl SharedError {
    pub fn new(err: anyhow::Error) -> Self {
        Self(Arc::new(err))
    }

    /// Returns the underlying collaborator error.
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

impl fmt::Debug for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

// == Gateway Error Enum ==
/// Errors surfaced to the request layer.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// The scraping or analysis collaborator failed
    #[error("{0}")]
    Compute(SharedError),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error (e.g. a compute task panicked)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for GatewayError {
    fn from(err: anyhow::Error) -> Self {
        GatewayError::Compute(SharedError::new(err))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GatewayError::Compute(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
            GatewayError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            GatewayError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// == Store Error Enum ==
/// Failures of a storage backend. Never reaches the request layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O failure, timeout or lost connection on a backend call
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Payload could not be encoded or decoded
    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Concurrent insert raced on a unique constraint
    #[error("constraint conflict: {0}")]
    ConstraintConflict(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => {
                StoreError::ConstraintConflict(err.to_string())
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

// == Result Type Aliases ==
/// Convenience Result type for the request layer.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Result type for backend calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_error_keeps_collaborator_message() {
        let err: GatewayError = anyhow::anyhow!("model service returned 503").into();
        assert_eq!(err.to_string(), "model service returned 503");

        let cloned = err.clone();
        assert_eq!(cloned.to_string(), err.to_string());
    }

    #[test]
    fn test_compute_error_maps_to_bad_gateway() {
        let err: GatewayError = anyhow::anyhow!("boom").into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_invalid_request_maps_to_bad_request() {
        let response = GatewayError::InvalidRequest("empty url".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_sqlite_constraint_maps_to_conflict() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE),
            Some("UNIQUE constraint failed".into()),
        );
        assert!(matches!(
            StoreError::from(err),
            StoreError::ConstraintConflict(_)
        ));
    }
}
