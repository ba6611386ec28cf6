//! Kernel trait

use crate::core::SparseVector;

/// Similarity K(x, y) between two feature vectors
///
/// Implementations must be symmetric; the solver caches K(i, j) and K(j, i)
/// under one key.
pub trait Kernel: Send + Sync {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64;
}
