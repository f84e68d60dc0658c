//! API Handlers
//!
//! HTTP request handlers for each cache endpoint.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::{CacheStats, TieredCache};
use crate::config::Config;
use crate::error::{ApiError, ConfigError, Result};
use crate::models::{
    validate_key, CleanupResponse, GetResponse, HealthResponse, InvalidateResponse, SetRequest,
    SetResponse,
};

/// Application state shared across all handlers.
///
/// The cache is itself a cheap, shareable handle, so no extra locking is
/// needed here.
#[derive(Clone)]
pub struct AppState {
    pub cache: TieredCache<Value>,
}

impl AppState {
    pub fn new(cache: TieredCache<Value>) -> Self {
        Self { cache }
    }

    /// Builds a memory-only cache from the configuration.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_config(config: &Config) -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(TieredCache::new(config.cache.clone())?))
    }
}

/// Handler for PUT /cache
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    match req.ttl {
        Some(ttl) => {
            state
                .cache
                .set_with_ttl(req.key.clone(), req.value, Duration::from_secs(ttl))
                .await
        }
        None => state.cache.set(req.key.clone(), req.value).await,
    }

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /cache/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get(&key).await {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(ApiError::NotFound(key)),
    }
}

/// Handler for DELETE /cache/:key
///
/// Invalidation is idempotent, so an absent key is not an error.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = validate_key(&key) {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    state.cache.invalidate(&key).await;
    Ok(Json(InvalidateResponse::new(key)))
}

/// Handler for POST /cleanup
pub async fn cleanup_handler(State(state): State<AppState>) -> Json<CleanupResponse> {
    let removed = state.cache.cleanup().await;
    Json(CleanupResponse { removed })
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.get_stats().await)
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
