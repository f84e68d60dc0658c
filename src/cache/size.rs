//! Size Estimation Module
//!
//! Approximates how many bytes a cached value occupies so the store can keep
//! its memory budget.

use serde::Serialize;

// == Size Estimator ==
/// Strategy used to charge a value against the memory budget.
///
/// Implementations may trade accuracy for speed. Any
/// `Fn(&V) -> u64 + Send + Sync` closure is an estimator.
pub trait SizeEstimator<V>: Send + Sync {
    fn estimate_size(&self, value: &V) -> u64;
}

impl<V, F> SizeEstimator<V> for F
where
    F: Fn(&V) -> u64 + Send + Sync,
{
    fn estimate_size(&self, value: &V) -> u64 {
        self(value)
    }
}

// == JSON Size Estimator ==
/// Serialize-and-measure estimator: the length of the compact JSON encoding.
///
/// Values that fail to serialize are charged their in-memory `size_of`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSizeEstimator;

impl<V: Serialize> SizeEstimator<V> for JsonSizeEstimator {
    fn estimate_size(&self, value: &V) -> u64 {
        match serde_json::to_vec(value) {
            Ok(bytes) => bytes.len() as u64,
            Err(_) => std::mem::size_of::<V>() as u64,
        }
    }
}
