//! Error types for the tiered cache
//!
//! Cache operations themselves never fail. These errors cover the three places
//! where something can go wrong: the fallback store, configuration, and the
//! HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Fallback Error ==
/// Error reported by a [`FallbackStore`](crate::fallback::FallbackStore).
///
/// The cache facade downgrades every variant to a miss (reads) or a logged
/// no-op (writes and deletes).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FallbackError {
    /// The backing store could not be reached
    #[error("Fallback store unavailable: {0}")]
    Unavailable(String),

    /// The backing store did not answer in time
    #[error("Fallback store timed out")]
    Timeout,

    /// The backing store does not implement the requested operation
    #[error("Fallback store does not support {0}")]
    Unsupported(&'static str),

    /// Any other failure reported by the backing store
    #[error("Fallback store error: {0}")]
    Other(String),
}

// == Config Error ==
/// Rejected cache configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Eviction threshold outside of (0, 1]
    #[error("Eviction threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f64),

    /// A hard limit was set to zero
    #[error("Limit `{0}` must be greater than zero")]
    ZeroLimit(&'static str),

    /// Cleanup interval of zero would spin the scheduler
    #[error("Cleanup interval must be greater than zero")]
    ZeroInterval,
}

// == Api Error ==
/// Errors surfaced by the HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Key not found in any tier
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the HTTP handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
