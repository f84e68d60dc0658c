//! Background Tasks Module
//!
//! Contains background tasks that run periodically for the lifetime of a
//! cache.
//!
//! # Tasks
//! - Cleanup: Removes expired entries and evicts above the threshold

mod cleanup;

pub use cleanup::spawn_cleanup_task;
