//! RBF (Radial Basis Function) kernel implementation
//!
//! The RBF kernel is defined as: K(x, y) = exp(-γ * ||x - y||²)
//! It is the kernel searched over by the (C, gamma) grid.

use crate::core::{Result, SVMError, SparseVector};
use crate::kernel::Kernel;

/// RBF kernel: K(x, y) = exp(-γ * ||x - y||²)
///
/// - High gamma: close points have high influence (potential overfitting)
/// - Low gamma: distant points have influence (potential underfitting)
#[derive(Debug, Clone, Copy)]
pub struct RBFKernel {
    gamma: f64,
}

impl RBFKernel {
    /// RBF kernel with the given gamma, which must be positive and finite
    pub fn new(gamma: f64) -> Result<Self> {
        validate_gamma(gamma)?;
        Ok(Self { gamma })
    }

    /// Create RBF kernel with gamma = 1.0 / n_features
    pub fn with_auto_gamma(n_features: usize) -> Result<Self> {
        if n_features == 0 {
            return Err(SVMError::InvalidParameter(
                "Number of features must be positive".to_string(),
            ));
        }
        Self::new(1.0 / n_features as f64)
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl Default for RBFKernel {
    fn default() -> Self {
        Self { gamma: 1.0 }
    }
}

impl Kernel for RBFKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        rbf(self.gamma, x, y)
    }
}

/// Reject gamma values the kernel is undefined or degenerate for
pub fn validate_gamma(gamma: f64) -> Result<()> {
    if gamma > 0.0 && gamma.is_finite() {
        Ok(())
    } else {
        Err(SVMError::InvalidParameter(format!(
            "gamma must be positive, got: {gamma}"
        )))
    }
}

pub(crate) fn rbf(gamma: f64, x: &SparseVector, y: &SparseVector) -> f64 {
    (-gamma * squared_euclidean_distance(x, y)).exp()
}

/// Squared Euclidean distance between two sparse vectors
fn squared_euclidean_distance(x: &SparseVector, y: &SparseVector) -> f64 {
    let mut distance_sq = 0.0;
    let (mut i, mut j) = (0, 0);

    while i < x.indices.len() && j < y.indices.len() {
        match x.indices[i].cmp(&y.indices[j]) {
            std::cmp::Ordering::Equal => {
                let diff = x.values[i] - y.values[j];
                distance_sq += diff * diff;
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => {
                distance_sq += x.values[i] * x.values[i];
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                distance_sq += y.values[j] * y.values[j];
                j += 1;
            }
        }
    }

    distance_sq += x.values[i..].iter().map(|v| v * v).sum::<f64>();
    distance_sq += y.values[j..].iter().map(|v| v * v).sum::<f64>();
    distance_sq
}
