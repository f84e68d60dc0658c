//! Models Module
//!
//! Request and response DTOs for the HTTP surface.

mod requests;
mod responses;

pub use requests::{validate_key, SetRequest, MAX_KEY_LENGTH};
pub use responses::{
    CleanupResponse, ErrorResponse, GetResponse, HealthResponse, InvalidateResponse, SetResponse,
};
