//! Median imputation of missing and infinite values

use crate::core::{Result, SVMError};
use crate::preprocess::Transform;
use crate::utils::stats::{median_sorted, sorted_finite_column};
use log::info;
use serde::{Deserialize, Serialize};

/// Per-column medians fitted on training data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imputer {
    pub statistics: Vec<f64>,
}

impl Imputer {
    /// Median of the finite values of every column, 0 when a column has none
    pub fn fit(x: &[Vec<f64>]) -> Result<Self> {
        let n_features = x.first().map(Vec::len).ok_or(SVMError::EmptyDataset)?;
        let statistics = (0..n_features)
            .map(|j| median_sorted(&sorted_finite_column(x, j)).unwrap_or(0.0))
            .collect();
        Ok(Self { statistics })
    }

    pub fn n_features(&self) -> usize {
        self.statistics.len()
    }
}

impl Transform for Imputer {
    /// NaN and ±inf become the fitted column median
    fn transform(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let has_inf = x.iter().flatten().any(|v| v.is_infinite());
        if has_inf {
            info!("Removing Inf and -Inf values...");
        }

        x.iter()
            .map(|row| {
                if row.len() != self.statistics.len() {
                    return Err(SVMError::DimensionMismatch {
                        expected: self.statistics.len(),
                        actual: row.len(),
                    });
                }
                Ok(row
                    .iter()
                    .zip(self.statistics.iter())
                    .map(|(&v, &median)| if v.is_finite() { v } else { median })
                    .collect())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imputer_replaces_nan_and_inf() {
        let x = vec![
            vec![1.0, f64::NAN, 5.0],
            vec![f64::NAN, 2.0, f64::INFINITY],
            vec![3.0, 4.0, 7.0],
        ];
        let imputer = Imputer::fit(&x).unwrap();
        assert_eq!(imputer.statistics, vec![2.0, 3.0, 6.0]);

        let out = imputer.transform(&x).unwrap();
        assert_eq!(out[0], vec![1.0, 3.0, 5.0]);
        assert_eq!(out[1], vec![2.0, 2.0, 6.0]);
        assert_eq!(out[2], vec![3.0, 4.0, 7.0]);
    }

    #[test]
    fn test_all_missing_column_imputes_zero() {
        let x = vec![vec![f64::NAN, 1.0], vec![f64::NEG_INFINITY, 2.0]];
        let imputer = Imputer::fit(&x).unwrap();
        assert_eq!(imputer.statistics, vec![0.0, 1.5]);
    }

    #[test]
    fn test_training_medians_used_on_new_data() {
        let imputer = Imputer::fit(&[vec![10.0], vec![20.0]]).unwrap();
        let out = imputer.transform(&[vec![f64::NAN]]).unwrap();
        assert_eq!(out, vec![vec![15.0]]);
        assert!(imputer.transform(&[vec![1.0, 2.0]]).is_err());
    }
}
