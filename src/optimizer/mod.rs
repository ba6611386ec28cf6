//! Binary SVM training
//!
//! Binds a kernel and solver configuration together and turns solver output
//! into a model that can evaluate the decision function.

use crate::core::{OptimizationResult, OptimizerConfig, Result, SVMModel, Sample};
use crate::kernel::Kernel;
use crate::solver::SMOSolver;
use std::sync::Arc;

/// Binary SVM optimizer that integrates a kernel with the SMO solver
pub struct SVMOptimizer<K: Kernel> {
    kernel: Arc<K>,
    config: OptimizerConfig,
}

impl<K: Kernel> SVMOptimizer<K> {
    pub fn new(kernel: K, config: OptimizerConfig) -> Self {
        Self {
            kernel: Arc::new(kernel),
            config,
        }
    }

    /// Train with a per-sample upper bound on alpha (weighted C)
    pub fn train_samples_with_bounds(
        &self,
        samples: &[Sample],
        upper_bounds: &[f64],
    ) -> Result<TrainedSVM<K>> {
        let solver = SMOSolver::new(Arc::clone(&self.kernel), self.config.clone());
        let result = solver.solve_with_bounds(samples, upper_bounds)?;
        Ok(TrainedSVM::new(Arc::clone(&self.kernel), samples, result))
    }
}

/// A trained binary SVM
#[derive(Clone)]
pub struct TrainedSVM<K: Kernel> {
    kernel: Arc<K>,
    support_vectors: Vec<Sample>,
    alpha: Vec<f64>,
    bias: f64,
    iterations: usize,
}

impl<K: Kernel> TrainedSVM<K> {
    pub(crate) fn new(
        kernel: Arc<K>,
        training_samples: &[Sample],
        optimization_result: OptimizationResult,
    ) -> Self {
        let (support_vectors, alpha) = optimization_result
            .support_vectors
            .iter()
            .map(|&sv_idx| {
                (
                    training_samples[sv_idx].clone(),
                    optimization_result.alpha[sv_idx],
                )
            })
            .unzip();

        Self {
            kernel,
            support_vectors,
            alpha,
            bias: optimization_result.b,
            iterations: optimization_result.iterations,
        }
    }

    /// Rebuild a model from persisted support vectors and coefficients
    pub fn from_parts(
        kernel: Arc<K>,
        support_vectors: Vec<Sample>,
        alpha: Vec<f64>,
        bias: f64,
    ) -> Self {
        Self {
            kernel,
            support_vectors,
            alpha,
            bias,
            iterations: 0,
        }
    }

    pub fn support_vectors(&self) -> &[Sample] {
        &self.support_vectors
    }

    pub fn alpha_values(&self) -> &[f64] {
        &self.alpha
    }

    /// Number of SMO iterations the solver ran (0 for restored models)
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

impl<K: Kernel> SVMModel for TrainedSVM<K> {
    fn decision_function(&self, sample: &Sample) -> f64 {
        self.support_vectors
            .iter()
            .zip(self.alpha.iter())
            .map(|(sv, &a)| a * sv.label * self.kernel.compute(&sample.features, &sv.features))
            .sum::<f64>()
            + self.bias
    }

    fn n_support_vectors(&self) -> usize {
        self.support_vectors.len()
    }

    fn bias(&self) -> f64 {
        self.bias
    }
}
