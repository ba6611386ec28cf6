//! Kernel functions for SVM

pub mod linear;
pub mod rbf;
pub mod traits;

pub use self::linear::*;
pub use self::rbf::*;
pub use self::traits::*;

use crate::core::{Result, SparseVector};
use serde::{Deserialize, Serialize};

/// Kernel selection used by the multi-class classifier and persisted models
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum KernelType {
    Linear,
    Rbf { gamma: f64 },
}

impl KernelType {
    /// RBF kernel with gamma = 1 / n_features
    pub fn rbf_auto(n_features: usize) -> Result<Self> {
        let gamma = RBFKernel::with_auto_gamma(n_features)?.gamma();
        Ok(KernelType::Rbf { gamma })
    }

    /// Check the parameters, e.g. of a kernel read from a model file
    pub fn validate(&self) -> Result<()> {
        match self {
            KernelType::Linear => Ok(()),
            KernelType::Rbf { gamma } => validate_gamma(*gamma),
        }
    }

    /// Gamma of an RBF kernel, `None` for the linear kernel
    pub fn gamma(&self) -> Option<f64> {
        match self {
            KernelType::Linear => None,
            KernelType::Rbf { gamma } => Some(*gamma),
        }
    }

    /// Short name used in reports ("linear" / "rbf")
    pub fn name(&self) -> &'static str {
        match self {
            KernelType::Linear => "linear",
            KernelType::Rbf { .. } => "rbf",
        }
    }
}

impl Kernel for KernelType {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        match self {
            KernelType::Linear => LinearKernel.compute(x, y),
            KernelType::Rbf { gamma } => rbf::rbf(*gamma, x, y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_type_dispatch() {
        let x = SparseVector::new(vec![0, 1], vec![1.0, 2.0]).unwrap();
        let y = SparseVector::new(vec![0, 1], vec![3.0, 4.0]).unwrap();

        assert_eq!(KernelType::Linear.compute(&x, &y), 11.0);

        let rbf = KernelType::Rbf { gamma: 0.5 };
        let expected = (-0.5_f64 * 8.0).exp();
        assert!((rbf.compute(&x, &y) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_kernel_type_auto_gamma() {
        assert_eq!(KernelType::rbf_auto(4).unwrap().gamma(), Some(0.25));
        assert!(KernelType::rbf_auto(0).is_err());
        assert_eq!(KernelType::Linear.gamma(), None);
        assert_eq!(KernelType::Linear.name(), "linear");
    }

    #[test]
    fn test_kernel_type_validate() {
        assert!(KernelType::Linear.validate().is_ok());
        assert!(KernelType::Rbf { gamma: 0.5 }.validate().is_ok());
        assert!(KernelType::Rbf { gamma: 0.0 }.validate().is_err());
        assert!(KernelType::Rbf { gamma: -1.0 }.validate().is_err());
        assert!(KernelType::Rbf { gamma: f64::NAN }.validate().is_err());
    }

    #[test]
    fn test_kernel_type_serde() {
        let kernel = KernelType::Rbf { gamma: 0.125 };
        let json = serde_json::to_string(&kernel).unwrap();
        assert!(json.contains("\"rbf\""));
        let back: KernelType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kernel);
    }
}
