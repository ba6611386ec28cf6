//! Guitar playing technique classification with Support Vector Machines
//!
//! Feature files per technique (bend, pull, hamm, slide, normal) are loaded,
//! preprocessed and fed to a one-vs-one RBF SVM trained with SMO. Experiments
//! run stratified cross-validation with a grid search over C and gamma and
//! write models, fitted transforms, reports and plots to an output directory.

pub mod api;
pub mod cache;
pub mod config;
pub mod core;
pub mod data;
pub mod kernel;
pub mod metrics;
pub mod optimizer;
pub mod persistence;
pub mod pipeline;
pub mod preprocess;
pub mod probability;
pub mod report;
pub mod solver;
pub mod utils;
pub mod validation;

// Re-export main types for convenience
pub use crate::api::{ClassWeight, ModelInfo, SupportVectorClassifier, SVC};
pub use crate::cache::{CacheStats, KernelCache};
pub use crate::config::ExperimentConfig;
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::core::{Result, SVMError};
pub use crate::data::FeatureSet;
pub use crate::kernel::{Kernel, KernelType, LinearKernel, RBFKernel};
pub use crate::metrics::{ConfusionMatrix, Scoring};
pub use crate::optimizer::{SVMOptimizer, TrainedSVM};
pub use crate::persistence::SerializableModel;
pub use crate::pipeline::{Experiment, ExperimentSummary};
pub use crate::preprocess::{PreprocessingConfig, Preprocessor, ScalingMethod};
pub use crate::validation::{GridSearch, StratifiedKFold};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
