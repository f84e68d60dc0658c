//! API Module
//!
//! HTTP surface over a `TieredCache<serde_json::Value>`.
//!
//! # Endpoints
//! - `PUT /cache` - Store a value
//! - `GET /cache/:key` - Retrieve a value
//! - `DELETE /cache/:key` - Invalidate a key in both tiers
//! - `POST /cleanup` - Run a sweep now
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check

mod handlers;
mod routes;

pub use handlers::AppState;
pub use routes::create_router;
