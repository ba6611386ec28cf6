//! Feature standardization

use crate::core::{Result, SVMError};
use crate::preprocess::Transform;
use crate::utils::stats::{column, mean, percentile_sorted, sorted_finite_column, std_dev};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How features are standardized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalingMethod {
    /// Z-score of whatever matrix is passed, nothing kept
    Scale,
    /// Median / IQR of whatever matrix is passed, nothing kept
    RobustScale,
    /// Z-score fitted on training data and persisted
    StandardScaler,
    /// Median / IQR fitted on training data and persisted
    RobustScaler,
}

impl ScalingMethod {
    /// Name used in file names and reports
    pub fn name(&self) -> &'static str {
        match self {
            ScalingMethod::Scale => "scale",
            ScalingMethod::RobustScale => "robust_scale",
            ScalingMethod::StandardScaler => "StandardScaler",
            ScalingMethod::RobustScaler => "RobustScaler",
        }
    }

    /// Whether the fitted statistics are reused on later data
    pub fn is_stateful(&self) -> bool {
        matches!(
            self,
            ScalingMethod::StandardScaler | ScalingMethod::RobustScaler
        )
    }

    fn is_robust(&self) -> bool {
        matches!(self, ScalingMethod::RobustScale | ScalingMethod::RobustScaler)
    }
}

impl fmt::Display for ScalingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalingMethod {
    type Err = SVMError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scale" => Ok(ScalingMethod::Scale),
            "robust_scale" | "robust-scale" => Ok(ScalingMethod::RobustScale),
            "StandardScaler" | "standard-scaler" => Ok(ScalingMethod::StandardScaler),
            "RobustScaler" | "robust-scaler" => Ok(ScalingMethod::RobustScaler),
            other => Err(SVMError::InvalidParameter(format!(
                "Unknown scaling method: {other}"
            ))),
        }
    }
}

/// Fitted centre and scale per column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub method: ScalingMethod,
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
}

impl Scaler {
    /// Fit centre/scale: mean/std, or median/IQR for the robust methods.
    /// Columns with zero spread are scaled by 1.
    pub fn fit(method: ScalingMethod, x: &[Vec<f64>]) -> Result<Self> {
        let n_features = x.first().map(Vec::len).ok_or(SVMError::EmptyDataset)?;
        let mut center = Vec::with_capacity(n_features);
        let mut scale = Vec::with_capacity(n_features);

        for j in 0..n_features {
            let (c, s) = if method.is_robust() {
                let sorted = sorted_finite_column(x, j);
                let median = percentile_sorted(&sorted, 50.0).unwrap_or(0.0);
                let q1 = percentile_sorted(&sorted, 25.0).unwrap_or(0.0);
                let q3 = percentile_sorted(&sorted, 75.0).unwrap_or(0.0);
                (median, q3 - q1)
            } else {
                let values = column(x, j);
                (mean(&values), std_dev(&values))
            };
            center.push(c);
            scale.push(if s == 0.0 || !s.is_finite() { 1.0 } else { s });
        }

        Ok(Self {
            method,
            center,
            scale,
        })
    }

    pub fn n_features(&self) -> usize {
        self.center.len()
    }
}

impl Transform for Scaler {
    fn transform(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        x.iter()
            .map(|row| {
                if row.len() != self.center.len() {
                    return Err(SVMError::DimensionMismatch {
                        expected: self.center.len(),
                        actual: row.len(),
                    });
                }
                Ok(row
                    .iter()
                    .zip(self.center.iter().zip(self.scale.iter()))
                    .map(|(&v, (&c, &s))| (v - c) / s)
                    .collect())
            })
            .collect()
    }
}

/// Z-score standardize a matrix with its own statistics
pub fn scale(x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    Scaler::fit(ScalingMethod::Scale, x)?.transform(x)
}

/// Median/IQR standardize a matrix with its own statistics
pub fn robust_scale(x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    Scaler::fit(ScalingMethod::RobustScale, x)?.transform(x)
}
