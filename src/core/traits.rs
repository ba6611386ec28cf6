//! Binary machine trait

use crate::core::Sample;

/// Trained machine separating labels +1 and -1
pub trait SVMModel: Send + Sync {
    /// Σ αᵢyᵢK(xᵢ, x) + b
    fn decision_function(&self, sample: &Sample) -> f64;

    fn n_support_vectors(&self) -> usize;

    fn bias(&self) -> f64;
}
