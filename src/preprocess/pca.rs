//! Principal component analysis
//!
//! Components are the leading eigenvectors of the sample covariance matrix,
//! found with cyclic Jacobi rotations.

use crate::core::{Result, SVMError};
use crate::preprocess::Transform;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Upper bound on the number of kept components
pub const MAX_COMPONENTS: usize = 100;

const MAX_SWEEPS: usize = 100;

/// Fitted projection onto the principal axes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pca {
    pub mean: Vec<f64>,
    /// One row per component, `n_features` long
    pub components: Vec<Vec<f64>>,
    pub explained_variance: Vec<f64>,
    /// Sum of the variances of all input features
    pub total_variance: f64,
}

impl Pca {
    /// Fit with min(n_samples, n_features, 100) components
    pub fn fit(x: &[Vec<f64>]) -> Result<Self> {
        let n_samples = x.len();
        let n_features = x.first().map(Vec::len).ok_or(SVMError::EmptyDataset)?;
        if n_features == 0 {
            return Err(SVMError::InvalidDataset(
                "PCA needs at least one feature".to_string(),
            ));
        }
        let n_components = n_samples.min(n_features).min(MAX_COMPONENTS);

        let mean: Vec<f64> = (0..n_features)
            .map(|j| x.iter().map(|row| row[j]).sum::<f64>() / n_samples as f64)
            .collect();

        let denom = if n_samples > 1 {
            (n_samples - 1) as f64
        } else {
            1.0
        };
        let mut cov = vec![vec![0.0; n_features]; n_features];
        for row in x {
            let centred: Vec<f64> = row.iter().zip(mean.iter()).map(|(v, m)| v - m).collect();
            for i in 0..n_features {
                for j in i..n_features {
                    cov[i][j] += centred[i] * centred[j];
                }
            }
        }
        for i in 0..n_features {
            for j in i..n_features {
                cov[i][j] /= denom;
                cov[j][i] = cov[i][j];
            }
        }

        let total_variance: f64 = (0..n_features).map(|i| cov[i][i]).sum();
        let (eigenvalues, eigenvectors) = symmetric_eigen(cov);

        let mut order: Vec<usize> = (0..n_features).collect();
        order.sort_by(|&a, &b| {
            eigenvalues[b]
                .partial_cmp(&eigenvalues[a])
                .unwrap_or(Ordering::Equal)
        });

        let mut components = Vec::with_capacity(n_components);
        let mut explained_variance = Vec::with_capacity(n_components);
        for &k in order.iter().take(n_components) {
            let mut component: Vec<f64> = (0..n_features).map(|i| eigenvectors[i][k]).collect();
            // Largest-magnitude loading is positive
            let pivot = component
                .iter()
                .copied()
                .fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
            if pivot < 0.0 {
                component.iter_mut().for_each(|v| *v = -*v);
            }
            components.push(component);
            explained_variance.push(eigenvalues[k].max(0.0));
        }

        debug!(
            "PCA kept {} of {} dimensions",
            components.len(),
            n_features
        );

        Ok(Self {
            mean,
            components,
            explained_variance,
            total_variance,
        })
    }

    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    /// Share of total variance captured by each kept component
    pub fn explained_variance_ratio(&self) -> Vec<f64> {
        if self.total_variance <= 0.0 {
            return vec![0.0; self.explained_variance.len()];
        }
        self.explained_variance
            .iter()
            .map(|v| v / self.total_variance)
            .collect()
    }
}

impl Transform for Pca {
    fn transform(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        x.iter()
            .map(|row| {
                if row.len() != self.mean.len() {
                    return Err(SVMError::DimensionMismatch {
                        expected: self.mean.len(),
                        actual: row.len(),
                    });
                }
                Ok(self
                    .components
                    .iter()
                    .map(|component| {
                        row.iter()
                            .zip(self.mean.iter())
                            .zip(component.iter())
                            .map(|((v, m), c)| (v - m) * c)
                            .sum()
                    })
                    .collect())
            })
            .collect()
    }
}

/// Eigenvalues and eigenvectors (as columns) of a symmetric matrix
fn symmetric_eigen(mut a: Vec<Vec<f64>>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = a.len();
    let mut v: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    let total: f64 = a.iter().flatten().map(|x| x * x).sum();
    let mut converged = false;

    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[i][j] * a[i][j])
            .sum();
        if off <= 1e-24 * total || off == 0.0 {
            converged = true;
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if a[p][q] == 0.0 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for row in a.iter_mut() {
                    let (akp, akq) = (row[p], row[q]);
                    row[p] = c * akp - s * akq;
                    row[q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[p][k], a[q][k]);
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for row in v.iter_mut() {
                    let (vkp, vkq) = (row[p], row[q]);
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }

    if !converged {
        warn!("Jacobi eigen-decomposition stopped after {MAX_SWEEPS} sweeps");
    }

    let eigenvalues = (0..n).map(|i| a[i][i]).collect();
    (eigenvalues, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_symmetric_eigen() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 2.0]];
        let (values, vectors) = symmetric_eigen(a.clone());
        let mut sorted = values.clone();
        sorted.sort_by(|x, y| x.partial_cmp(y).unwrap());
        assert_abs_diff_eq!(sorted[0], 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(sorted[1], 3.0, epsilon = 1e-10);

        for k in 0..2 {
            for i in 0..2 {
                let av: f64 = (0..2).map(|j| a[i][j] * vectors[j][k]).sum();
                assert_abs_diff_eq!(av, values[k] * vectors[i][k], epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_pca_finds_main_axis() {
        // Points spread along the diagonal
        let x = vec![
            vec![-2.0, -2.1],
            vec![-1.0, -0.9],
            vec![0.0, 0.1],
            vec![1.0, 1.0],
            vec![2.0, 1.9],
        ];
        let pca = Pca::fit(&x).unwrap();
        assert_eq!(pca.n_components(), 2);
        assert!(pca.explained_variance[0] > pca.explained_variance[1]);
        let ratio: f64 = pca.explained_variance_ratio().iter().sum();
        assert_abs_diff_eq!(ratio, 1.0, epsilon = 1e-9);

        let axis = &pca.components[0];
        assert_abs_diff_eq!(axis[0], std::f64::consts::FRAC_1_SQRT_2, epsilon = 0.05);
        assert_abs_diff_eq!(axis[1], std::f64::consts::FRAC_1_SQRT_2, epsilon = 0.05);

        let projected = pca.transform(&x).unwrap();
        let first: f64 = projected.iter().map(|r| r[0]).sum();
        assert_abs_diff_eq!(first, 0.0, epsilon = 1e-10);
        assert!(projected[4][0] > projected[0][0]);
    }

    #[test]
    fn test_component_count_limited_by_samples() {
        let x = vec![vec![1.0, 2.0, 3.0, 4.0], vec![2.0, 1.0, 0.0, 4.0]];
        let pca = Pca::fit(&x).unwrap();
        assert_eq!(pca.n_components(), 2);
        assert_eq!(pca.transform(&x).unwrap()[0].len(), 2);
    }

    #[test]
    fn test_pca_dimension_check() {
        let pca = Pca::fit(&[vec![1.0, 2.0], vec![3.0, 5.0]]).unwrap();
        assert!(matches!(
            pca.transform(&[vec![1.0]]),
            Err(SVMError::DimensionMismatch { .. })
        ));
    }
}
