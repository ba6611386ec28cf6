//! Sequential Minimal Optimization (SMO) solver implementation
//!
//! Solves the binary C-SVC dual problem
//!
//! ```text
//! min  ½ αᵀQα − eᵀα    s.t.  yᵀα = 0,  0 ≤ αᵢ ≤ Cᵢ,   Qᵢⱼ = yᵢyⱼK(xᵢ, xⱼ)
//! ```
//!
//! by repeatedly optimizing a pair of Lagrange multipliers. The pair is the
//! maximal violating pair with second-order selection of the partner, and the
//! upper bound `Cᵢ` may differ per sample so that class weights can be
//! expressed as `C * weight[yᵢ]`.

use crate::cache::KernelCache;
use crate::core::{OptimizationResult, OptimizerConfig, Result, SVMError, Sample};
use crate::kernel::Kernel;
use log::{debug, warn};
use std::sync::Arc;

/// Replacement for a non-positive curvature along the pair direction
const TAU: f64 = 1e-12;

/// SMO solver for SVM optimization
pub struct SMOSolver<K: Kernel> {
    kernel: Arc<K>,
    config: OptimizerConfig,
}

impl<K: Kernel> SMOSolver<K> {
    /// Create a new SMO solver with the given kernel and configuration
    pub fn new(kernel: Arc<K>, config: OptimizerConfig) -> Self {
        Self { kernel, config }
    }

    /// Compute kernel value with caching
    fn kernel_cached(
        &self,
        cache: &mut KernelCache,
        samples: &[Sample],
        i: usize,
        j: usize,
    ) -> f64 {
        cache.get_or_compute(i, j, || {
            self.kernel
                .compute(&samples[i].features, &samples[j].features)
        })
    }

    /// Solve with the same upper bound `C` for every sample
    pub fn solve(&self, samples: &[Sample]) -> Result<OptimizationResult> {
        let bounds = vec![self.config.c; samples.len()];
        self.solve_with_bounds(samples, &bounds)
    }

    /// Solve with a per-sample upper bound on alpha
    pub fn solve_with_bounds(
        &self,
        samples: &[Sample],
        upper_bounds: &[f64],
    ) -> Result<OptimizationResult> {
        let mut cache = KernelCache::with_memory_limit(self.config.cache_size);
        self.solve_with_cache(samples, upper_bounds, &mut cache)
    }

    /// Solve using an externally managed kernel cache
    ///
    /// The cache is indexed by sample position, so it must only be shared
    /// between problems built over the same sample slice.
    pub fn solve_with_cache(
        &self,
        samples: &[Sample],
        upper_bounds: &[f64],
        cache: &mut KernelCache,
    ) -> Result<OptimizationResult> {
        if samples.is_empty() {
            return Err(SVMError::EmptyDataset);
        }
        let n = samples.len();
        if upper_bounds.len() != n {
            return Err(SVMError::DimensionMismatch {
                expected: n,
                actual: upper_bounds.len(),
            });
        }
        for sample in samples {
            if sample.label != 1.0 && sample.label != -1.0 {
                return Err(SVMError::InvalidLabel(sample.label));
            }
        }
        if let Some(&bad) = upper_bounds.iter().find(|&&c| !(c > 0.0 && c.is_finite())) {
            return Err(SVMError::InvalidParameter(format!(
                "Upper bound C must be positive and finite, got: {bad}"
            )));
        }

        // Only one class present: the decision is that label everywhere
        let first_label = samples[0].label;
        if samples.iter().all(|s| s.label == first_label) {
            return Ok(OptimizationResult {
                alpha: vec![0.0; n],
                b: first_label,
                support_vectors: Vec::new(),
                iterations: 0,
                objective_value: 0.0,
            });
        }

        let diag: Vec<f64> = (0..n)
            .map(|i| self.kernel_cached(cache, samples, i, i))
            .collect();
        let mut alpha = vec![0.0; n];
        // Gradient of the dual objective: G = Qα − e
        let mut gradient = vec![-1.0; n];
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            let Some((i, j)) =
                self.select_working_set(cache, samples, &alpha, &gradient, upper_bounds, &diag)
            else {
                break;
            };

            let (alpha_i_old, alpha_j_old) = (alpha[i], alpha[j]);
            self.take_step(i, j, cache, samples, &mut alpha, &gradient, upper_bounds, &diag);

            let delta_i = alpha[i] - alpha_i_old;
            let delta_j = alpha[j] - alpha_j_old;
            let (y_i, y_j) = (samples[i].label, samples[j].label);
            for t in 0..n {
                let k_ti = self.kernel_cached(cache, samples, t, i);
                let k_tj = self.kernel_cached(cache, samples, t, j);
                gradient[t] += samples[t].label * (y_i * k_ti * delta_i + y_j * k_tj * delta_j);
            }

            iterations += 1;
        }

        if iterations >= self.config.max_iterations {
            warn!(
                "SMO reached the iteration limit ({}) before convergence",
                self.config.max_iterations
            );
        }

        let bias = self.calculate_bias(&alpha, &gradient, samples, upper_bounds);
        let support_vectors: Vec<usize> = alpha
            .iter()
            .enumerate()
            .filter_map(|(i, &a)| (a > 0.0).then_some(i))
            .collect();
        let objective_value = self.calculate_objective(&alpha, &gradient);

        debug!(
            "SMO finished: {} iterations, {} support vectors, cache hit rate {:.2}",
            iterations,
            support_vectors.len(),
            cache.hit_rate()
        );

        Ok(OptimizationResult {
            alpha,
            b: bias,
            support_vectors,
            iterations,
            objective_value,
        })
    }

    /// Pick the maximal violating index `i` and its second-order partner `j`.
    ///
    /// Returns `None` once the KKT gap falls below epsilon.
    fn select_working_set(
        &self,
        cache: &mut KernelCache,
        samples: &[Sample],
        alpha: &[f64],
        gradient: &[f64],
        upper_bounds: &[f64],
        diag: &[f64],
    ) -> Option<(usize, usize)> {
        let mut g_max = f64::NEG_INFINITY;
        let mut selected_i = None;

        for t in 0..samples.len() {
            if samples[t].label > 0.0 {
                if alpha[t] < upper_bounds[t] && -gradient[t] >= g_max {
                    g_max = -gradient[t];
                    selected_i = Some(t);
                }
            } else if alpha[t] > 0.0 && gradient[t] >= g_max {
                g_max = gradient[t];
                selected_i = Some(t);
            }
        }
        let i = selected_i?;

        let mut g_max2 = f64::NEG_INFINITY;
        let mut obj_min = f64::INFINITY;
        let mut selected_j = None;

        for t in 0..samples.len() {
            let (in_low_set, grad_diff, violation) = if samples[t].label > 0.0 {
                (alpha[t] > 0.0, g_max + gradient[t], gradient[t])
            } else {
                (alpha[t] < upper_bounds[t], g_max - gradient[t], -gradient[t])
            };
            if !in_low_set {
                continue;
            }
            g_max2 = g_max2.max(violation);

            if grad_diff > 0.0 {
                let k_it = self.kernel_cached(cache, samples, i, t);
                let quad = diag[i] + diag[t] - 2.0 * k_it;
                let quad = if quad > 0.0 { quad } else { TAU };
                let obj = -(grad_diff * grad_diff) / quad;
                if obj <= obj_min {
                    obj_min = obj;
                    selected_j = Some(t);
                }
            }
        }

        if g_max + g_max2 < self.config.epsilon {
            return None;
        }
        selected_j.map(|j| (i, j))
    }

    /// Analytically optimize the pair (i, j) and clip to the box constraints
    #[allow(clippy::too_many_arguments)]
    fn take_step(
        &self,
        i: usize,
        j: usize,
        cache: &mut KernelCache,
        samples: &[Sample],
        alpha: &mut [f64],
        gradient: &[f64],
        upper_bounds: &[f64],
        diag: &[f64],
    ) {
        let k_ij = self.kernel_cached(cache, samples, i, j);
        let quad = diag[i] + diag[j] - 2.0 * k_ij;
        let quad = if quad > 0.0 { quad } else { TAU };
        let (c_i, c_j) = (upper_bounds[i], upper_bounds[j]);

        if samples[i].label != samples[j].label {
            let delta = (-gradient[i] - gradient[j]) / quad;
            let diff = alpha[i] - alpha[j];
            alpha[i] += delta;
            alpha[j] += delta;

            if diff > 0.0 {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = diff;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = -diff;
            }

            if diff > c_i - c_j {
                if alpha[i] > c_i {
                    alpha[i] = c_i;
                    alpha[j] = c_i - diff;
                }
            } else if alpha[j] > c_j {
                alpha[j] = c_j;
                alpha[i] = c_j + diff;
            }
        } else {
            let delta = (gradient[i] - gradient[j]) / quad;
            let sum = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;

            if sum > c_i {
                if alpha[i] > c_i {
                    alpha[i] = c_i;
                    alpha[j] = sum - c_i;
                }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }

            if sum > c_j {
                if alpha[j] > c_j {
                    alpha[j] = c_j;
                    alpha[i] = sum - c_j;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }
        }
    }

    /// Bias from free support vectors, or the midpoint of the feasible range
    fn calculate_bias(
        &self,
        alpha: &[f64],
        gradient: &[f64],
        samples: &[Sample],
        upper_bounds: &[f64],
    ) -> f64 {
        let mut upper = f64::INFINITY;
        let mut lower = f64::NEG_INFINITY;
        let mut free_sum = 0.0;
        let mut free_count = 0usize;

        for t in 0..samples.len() {
            let y = samples[t].label;
            let y_grad = y * gradient[t];
            let at_upper = alpha[t] >= upper_bounds[t];
            let at_lower = alpha[t] <= 0.0;

            if (at_upper && y < 0.0) || (at_lower && y > 0.0) {
                upper = upper.min(y_grad);
            } else if at_upper || at_lower {
                lower = lower.max(y_grad);
            } else {
                free_count += 1;
                free_sum += y_grad;
            }
        }

        let rho = if free_count > 0 {
            free_sum / free_count as f64
        } else {
            match (upper.is_finite(), lower.is_finite()) {
                (true, true) => (upper + lower) / 2.0,
                (true, false) => upper,
                (false, true) => lower,
                (false, false) => 0.0,
            }
        };

        -rho
    }

    /// Dual objective value eᵀα − ½αᵀQα (non-negative at the optimum)
    fn calculate_objective(&self, alpha: &[f64], gradient: &[f64]) -> f64 {
        -alpha
            .iter()
            .zip(gradient.iter())
            .map(|(&a, &g)| a * (g - 1.0))
            .sum::<f64>()
            / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SparseVector;
    use crate::kernel::{LinearKernel, RBFKernel};
    use approx::assert_abs_diff_eq;

    fn sample(values: &[f64], label: f64) -> Sample {
        Sample::new(SparseVector::from_dense(values), label)
    }

    fn decision<K: Kernel>(kernel: &K, samples: &[Sample], result: &OptimizationResult, x: &[f64]) -> f64 {
        let x = SparseVector::from_dense(x);
        samples
            .iter()
            .zip(result.alpha.iter())
            .map(|(s, &a)| a * s.label * kernel.compute(&s.features, &x))
            .sum::<f64>()
            + result.b
    }

    #[test]
    fn test_smo_solver_empty_dataset() {
        let solver = SMOSolver::new(Arc::new(LinearKernel::new()), OptimizerConfig::default());
        assert!(matches!(solver.solve(&[]), Err(SVMError::EmptyDataset)));
    }

    #[test]
    fn test_smo_solver_invalid_labels() {
        let solver = SMOSolver::new(Arc::new(LinearKernel::new()), OptimizerConfig::default());
        let samples = vec![sample(&[1.0], 2.0)];
        assert!(matches!(
            solver.solve(&samples),
            Err(SVMError::InvalidLabel(l)) if l == 2.0
        ));
    }

    #[test]
    fn test_smo_solver_bounds_length_mismatch() {
        let solver = SMOSolver::new(Arc::new(LinearKernel::new()), OptimizerConfig::default());
        let samples = vec![sample(&[1.0], 1.0), sample(&[-1.0], -1.0)];
        let result = solver.solve_with_bounds(&samples, &[1.0]);
        assert!(matches!(
            result,
            Err(SVMError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_smo_solver_rejects_non_positive_bound() {
        let solver = SMOSolver::new(Arc::new(LinearKernel::new()), OptimizerConfig::default());
        let samples = vec![sample(&[1.0], 1.0), sample(&[-1.0], -1.0)];
        assert!(matches!(
            solver.solve_with_bounds(&samples, &[1.0, 0.0]),
            Err(SVMError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_smo_solver_two_point_margin() {
        let solver = SMOSolver::new(Arc::new(LinearKernel::new()), OptimizerConfig::default());
        let samples = vec![sample(&[2.0], 1.0), sample(&[-2.0], -1.0)];

        let result = solver.solve(&samples).expect("Should solve");

        // w = 0.5, b = 0 places both points exactly on the margin
        assert_abs_diff_eq!(result.alpha[0], 0.125, epsilon = 1e-6);
        assert_abs_diff_eq!(result.alpha[1], 0.125, epsilon = 1e-6);
        assert_abs_diff_eq!(result.b, 0.0, epsilon = 1e-6);
        assert_eq!(result.support_vectors, vec![0, 1]);
        assert!(result.objective_value > 0.0);
    }

    #[test]
    fn test_smo_solver_single_class() {
        let solver = SMOSolver::new(Arc::new(LinearKernel::new()), OptimizerConfig::default());
        let samples = vec![sample(&[1.0], -1.0), sample(&[3.0], -1.0)];

        let result = solver.solve(&samples).expect("Should handle one class");
        assert_eq!(result.alpha, vec![0.0, 0.0]);
        assert_eq!(result.b, -1.0);
        assert!(result.support_vectors.is_empty());
    }

    #[test]
    fn test_smo_solver_respects_box_and_equality_constraints() {
        let mut config = OptimizerConfig::default();
        config.c = 0.5;
        let solver = SMOSolver::new(Arc::new(RBFKernel::new(0.5).unwrap()), config);

        let samples = vec![
            sample(&[0.0, 0.0], 1.0),
            sample(&[0.2, 0.1], 1.0),
            sample(&[1.0, 1.0], -1.0),
            sample(&[0.9, 1.2], -1.0),
            sample(&[0.5, 0.4], 1.0),
            sample(&[0.6, 0.5], -1.0),
        ];
        let bounds = vec![0.5, 0.5, 1.5, 1.5, 0.5, 1.5];

        let result = solver
            .solve_with_bounds(&samples, &bounds)
            .expect("Should solve");

        for (a, c) in result.alpha.iter().zip(bounds.iter()) {
            assert!(*a >= 0.0 && *a <= *c + 1e-12);
        }
        let balance: f64 = result
            .alpha
            .iter()
            .zip(samples.iter())
            .map(|(a, s)| a * s.label)
            .sum();
        assert_abs_diff_eq!(balance, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_smo_solver_separates_clusters() {
        let kernel = RBFKernel::new(0.5).unwrap();
        let mut config = OptimizerConfig::default();
        config.c = 10.0;
        let solver = SMOSolver::new(Arc::new(kernel), config);

        let samples = vec![
            sample(&[2.0, 2.1], 1.0),
            sample(&[1.8, 2.0], 1.0),
            sample(&[2.2, 1.9], 1.0),
            sample(&[-2.0, -1.9], -1.0),
            sample(&[-1.8, -2.2], -1.0),
            sample(&[-2.1, -2.0], -1.0),
        ];

        let result = solver.solve(&samples).expect("Should solve");
        for s in &samples {
            let f = decision(&kernel, &samples, &result, &s.features.to_dense(2));
            assert_eq!(f.signum(), s.label);
        }
        assert!(decision(&kernel, &samples, &result, &[1.5, 1.5]) > 0.0);
        assert!(decision(&kernel, &samples, &result, &[-1.5, -1.5]) < 0.0);
    }

    #[test]
    fn test_smo_solver_max_iterations() {
        let mut config = OptimizerConfig::default();
        config.max_iterations = 1;
        config.epsilon = 1e-9;
        let solver = SMOSolver::new(Arc::new(LinearKernel::new()), config);

        let samples = vec![
            sample(&[1.0, 1.0], 1.0),
            sample(&[-1.0, -1.0], -1.0),
            sample(&[1.0, -1.0], 1.0),
            sample(&[-1.0, 1.0], -1.0),
            sample(&[0.1, 0.2], -1.0),
        ];

        let result = solver.solve(&samples).expect("Should solve");
        assert_eq!(result.iterations, 1);
        assert!(result.b.is_finite());
    }

    #[test]
    fn test_shared_cache_is_used() {
        let solver = SMOSolver::new(Arc::new(LinearKernel::new()), OptimizerConfig::default());
        let samples = vec![
            sample(&[1.0], 1.0),
            sample(&[-1.0], -1.0),
            sample(&[0.5], 1.0),
            sample(&[-0.5], -1.0),
        ];
        let bounds = vec![1.0; 4];
        let mut cache = KernelCache::new(64);

        solver
            .solve_with_cache(&samples, &bounds, &mut cache)
            .expect("Should solve");
        assert!(cache.stats().hits > 0);
        assert!(cache.stats().size > 0);
    }
}
