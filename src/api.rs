//! Multi-class support vector classification
//!
//! [`SVC`] is a builder for one-vs-one classifiers over integer class
//! labels. Each pair of classes gets its own binary machine trained by the
//! SMO solver; prediction is a majority vote over all pairs.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use gtsvm::api::{ClassWeight, SVC};
//! use gtsvm::kernel::KernelType;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let x = vec![vec![0.0, 0.1], vec![0.2, 0.0], vec![3.0, 3.1], vec![3.2, 2.9]];
//! let y = vec![0, 0, 1, 1];
//!
//! let model = SVC::new()
//!     .with_kernel(KernelType::Rbf { gamma: 0.5 })
//!     .with_c(4.0)
//!     .with_class_weight(ClassWeight::Balanced)
//!     .fit(&x, &y)?;
//!
//! let predictions = model.predict(&[vec![3.0, 3.0]])?;
//! println!("{predictions:?}");
//! # Ok(())
//! # }
//! ```

use crate::core::{OptimizerConfig, Result, SVMError, SVMModel, Sample, SparseVector};
use crate::kernel::KernelType;
use crate::optimizer::{SVMOptimizer, TrainedSVM};
use crate::probability::{couple_pairwise, PlattScaling};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-class scaling of the regularization parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassWeight {
    /// Every class uses C unchanged
    #[default]
    Uniform,
    /// Class c uses C * n_samples / (n_classes * count_c)
    Balanced,
}

/// Multi-class SVM builder
#[derive(Debug, Clone)]
pub struct SVC {
    kernel: Option<KernelType>,
    config: OptimizerConfig,
    class_weight: ClassWeight,
    probability: bool,
}

impl SVC {
    /// RBF kernel with gamma = 1 / n_features, C = 1, uniform weights
    pub fn new() -> Self {
        Self {
            kernel: None,
            config: OptimizerConfig::default(),
            class_weight: ClassWeight::Uniform,
            probability: false,
        }
    }

    pub fn with_kernel(mut self, kernel: KernelType) -> Self {
        self.kernel = Some(kernel);
        self
    }

    /// Shorthand for an RBF kernel with the given gamma
    pub fn with_gamma(self, gamma: f64) -> Self {
        self.with_kernel(KernelType::Rbf { gamma })
    }

    /// Set regularization parameter C
    pub fn with_c(mut self, c: f64) -> Self {
        self.config.c = c;
        self
    }

    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    /// Fit Platt sigmoids so that `predict_proba` is available
    pub fn with_probability(mut self, probability: bool) -> Self {
        self.probability = probability;
        self
    }

    /// Set convergence tolerance
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.config.epsilon = epsilon;
        self
    }

    /// Set maximum number of iterations per binary machine
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set kernel cache size in bytes
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.config.cache_size = cache_size;
        self
    }

    pub fn c(&self) -> f64 {
        self.config.c
    }

    pub fn kernel(&self) -> Option<KernelType> {
        self.kernel
    }

    pub fn class_weight(&self) -> ClassWeight {
        self.class_weight
    }

    pub fn probability(&self) -> bool {
        self.probability
    }

    /// Train on dense rows with integer class labels
    pub fn fit(&self, x: &[Vec<f64>], y: &[usize]) -> Result<SupportVectorClassifier> {
        if x.is_empty() {
            return Err(SVMError::EmptyDataset);
        }
        if x.len() != y.len() {
            return Err(SVMError::InvalidDataset(format!(
                "{} rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if let Some(row) = x.iter().find(|row| row.len() != n_features) {
            return Err(SVMError::DimensionMismatch {
                expected: n_features,
                actual: row.len(),
            });
        }
        if !(self.config.c > 0.0 && self.config.c.is_finite()) {
            return Err(SVMError::InvalidParameter(format!(
                "C must be positive, got: {}",
                self.config.c
            )));
        }

        let kernel = match self.kernel {
            Some(kernel) => kernel,
            None => KernelType::rbf_auto(n_features)?,
        };
        kernel.validate()?;

        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for &label in y {
            *counts.entry(label).or_insert(0) += 1;
        }
        if counts.len() < 2 {
            return Err(SVMError::InvalidDataset(format!(
                "At least two classes are required, got {}",
                counts.len()
            )));
        }
        let classes: Vec<usize> = counts.keys().copied().collect();
        let class_weights = self.class_weights(&counts, y.len());

        let samples: Vec<SparseVector> = x.iter().map(|row| SparseVector::from_dense(row)).collect();
        let optimizer = SVMOptimizer::new(kernel, self.config.clone());

        let mut machines = Vec::with_capacity(classes.len() * (classes.len() - 1) / 2);
        for i in 0..classes.len() {
            for j in (i + 1)..classes.len() {
                let mut pair_samples = Vec::new();
                let mut bounds = Vec::new();
                for (features, &label) in samples.iter().zip(y.iter()) {
                    let (sign, weight) = if label == classes[i] {
                        (1.0, class_weights[i])
                    } else if label == classes[j] {
                        (-1.0, class_weights[j])
                    } else {
                        continue;
                    };
                    pair_samples.push(Sample::new(features.clone(), sign));
                    bounds.push(self.config.c * weight);
                }

                let model = optimizer.train_samples_with_bounds(&pair_samples, &bounds)?;
                debug!(
                    "Pair ({}, {}): {} samples, {} support vectors, {} iterations",
                    classes[i],
                    classes[j],
                    pair_samples.len(),
                    model.n_support_vectors(),
                    model.iterations()
                );

                let platt = if self.probability {
                    let decisions: Vec<f64> = pair_samples
                        .iter()
                        .map(|s| model.decision_function(s))
                        .collect();
                    let positive: Vec<bool> = pair_samples.iter().map(|s| s.label > 0.0).collect();
                    Some(PlattScaling::fit(&decisions, &positive))
                } else {
                    None
                };

                machines.push(PairwiseMachine {
                    positive: i,
                    negative: j,
                    model,
                    platt,
                });
            }
        }

        Ok(SupportVectorClassifier {
            classes,
            kernel,
            c: self.config.c,
            class_weights,
            machines,
            n_features,
            probability: self.probability,
        })
    }

    fn class_weights(&self, counts: &BTreeMap<usize, usize>, n_samples: usize) -> Vec<f64> {
        match self.class_weight {
            ClassWeight::Uniform => vec![1.0; counts.len()],
            ClassWeight::Balanced => counts
                .values()
                .map(|&count| n_samples as f64 / (counts.len() * count) as f64)
                .collect(),
        }
    }
}

impl Default for SVC {
    fn default() -> Self {
        Self::new()
    }
}

/// Binary machine separating two classes
///
/// `positive` and `negative` index into the classifier's class list; a
/// positive decision value votes for `positive`.
#[derive(Clone)]
pub struct PairwiseMachine {
    pub positive: usize,
    pub negative: usize,
    pub model: TrainedSVM<KernelType>,
    pub platt: Option<PlattScaling>,
}

/// Trained one-vs-one classifier
#[derive(Clone)]
pub struct SupportVectorClassifier {
    classes: Vec<usize>,
    kernel: KernelType,
    c: f64,
    class_weights: Vec<f64>,
    machines: Vec<PairwiseMachine>,
    n_features: usize,
    probability: bool,
}

impl SupportVectorClassifier {
    /// Reassemble a classifier from its parts (used when loading models)
    pub fn from_parts(
        classes: Vec<usize>,
        kernel: KernelType,
        c: f64,
        class_weights: Vec<f64>,
        machines: Vec<PairwiseMachine>,
        n_features: usize,
    ) -> Result<Self> {
        kernel.validate()?;
        let k = classes.len();
        if k < 2 {
            return Err(SVMError::InvalidDataset(format!(
                "At least two classes are required, got {k}"
            )));
        }
        if machines.len() != k * (k - 1) / 2 {
            return Err(SVMError::InvalidDataset(format!(
                "Expected {} pairwise machines for {k} classes, got {}",
                k * (k - 1) / 2,
                machines.len()
            )));
        }
        if class_weights.len() != k {
            return Err(SVMError::DimensionMismatch {
                expected: k,
                actual: class_weights.len(),
            });
        }
        if let Some(m) = machines.iter().find(|m| m.positive >= k || m.negative >= k) {
            return Err(SVMError::InvalidDataset(format!(
                "Machine refers to class index {} outside 0..{k}",
                m.positive.max(m.negative)
            )));
        }
        let probability = machines.iter().all(|m| m.platt.is_some());

        Ok(Self {
            classes,
            kernel,
            c,
            class_weights,
            machines,
            n_features,
            probability,
        })
    }

    /// Predicted class label for every row
    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<usize>> {
        x.iter().map(|row| self.predict_one(row)).collect()
    }

    /// Predicted class label of a single row
    pub fn predict_one(&self, row: &[f64]) -> Result<usize> {
        let decisions = self.pair_decisions(row)?;
        let mut votes = vec![0usize; self.classes.len()];
        for (machine, &dec) in self.machines.iter().zip(decisions.iter()) {
            if dec > 0.0 {
                votes[machine.positive] += 1;
            } else {
                votes[machine.negative] += 1;
            }
        }

        // First maximum wins, so ties go to the lowest class
        let mut best = 0;
        for (idx, &v) in votes.iter().enumerate() {
            if v > votes[best] {
                best = idx;
            }
        }
        Ok(self.classes[best])
    }

    /// One decision value per class pair, in (0,1), (0,2), ..., (1,2), ... order
    pub fn decision_function(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        x.iter().map(|row| self.pair_decisions(row)).collect()
    }

    /// Per-class probabilities, columns ordered like [`classes`](Self::classes)
    pub fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        if !self.probability {
            return Err(SVMError::InvalidParameter(
                "Probability estimates were not enabled for this model".to_string(),
            ));
        }

        let k = self.classes.len();
        x.iter()
            .map(|row| {
                let decisions = self.pair_decisions(row)?;
                let mut r = vec![vec![0.0; k]; k];
                for (machine, &dec) in self.machines.iter().zip(decisions.iter()) {
                    let p = machine
                        .platt
                        .map(|platt| platt.predict_clamped(dec))
                        .unwrap_or(0.5);
                    r[machine.positive][machine.negative] = p;
                    r[machine.negative][machine.positive] = 1.0 - p;
                }
                Ok(couple_pairwise(&r))
            })
            .collect()
    }

    /// Mean accuracy on the given rows and labels
    pub fn score(&self, x: &[Vec<f64>], y: &[usize]) -> Result<f64> {
        if x.is_empty() {
            return Err(SVMError::EmptyDataset);
        }
        let predictions = self.predict(x)?;
        let correct = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, t)| p == t)
            .count();
        Ok(correct as f64 / y.len() as f64)
    }

    fn pair_decisions(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.n_features {
            return Err(SVMError::DimensionMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }
        let sample = Sample::new(SparseVector::from_dense(row), 0.0);
        Ok(self
            .machines
            .iter()
            .map(|m| m.model.decision_function(&sample))
            .collect())
    }

    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    pub fn kernel(&self) -> KernelType {
        self.kernel
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    pub fn class_weights(&self) -> &[f64] {
        &self.class_weights
    }

    pub fn machines(&self) -> &[PairwiseMachine] {
        &self.machines
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn has_probability(&self) -> bool {
        self.probability
    }

    /// Total support vectors across all pairwise machines
    pub fn n_support_vectors(&self) -> usize {
        self.machines
            .iter()
            .map(|m| m.model.n_support_vectors())
            .sum()
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            classes: self.classes.clone(),
            n_machines: self.machines.len(),
            n_support_vectors: self.n_support_vectors(),
            n_features: self.n_features,
            kernel: self.kernel,
            c: self.c,
            probability: self.probability,
        }
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub classes: Vec<usize>,
    pub n_machines: usize,
    pub n_support_vectors: usize,
    pub n_features: usize,
    pub kernel: KernelType,
    pub c: f64,
    pub probability: bool,
}
