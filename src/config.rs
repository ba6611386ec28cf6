//! Experiment configuration
//!
//! Settings can come from the command line or a JSON file; missing fields
//! take their defaults. The effective configuration is written next to the
//! results as `experiment.json`.

use crate::api::{ClassWeight, SVC};
use crate::core::{OptimizerConfig, Result, SVMError};
use crate::preprocess::PreprocessingConfig;
use crate::utils::{read_json, write_json};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "experiment.json";

/// Convergence settings of the SMO solver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub epsilon: f64,
    pub max_iterations: usize,
    /// Kernel cache size in bytes
    pub cache_size: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        let defaults = OptimizerConfig::default();
        Self {
            epsilon: defaults.epsilon,
            max_iterations: defaults.max_iterations,
            cache_size: defaults.cache_size,
        }
    }
}

/// Everything one classification experiment needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Directory holding `*.raw.feature` files
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Technique names to classify
    pub classes: Vec<String>,
    pub grid_search: bool,
    /// Retrain on all data with the averaged best parameters
    pub train_all: bool,
    /// Balance class sizes by subsampling
    pub downsample: bool,
    /// Also train the 3x3 neighbourhood of the averaged parameters
    pub exhaustive: bool,
    pub probability: bool,
    #[serde(rename = "C")]
    pub c: f64,
    /// RBF gamma, 1 / n_features when unset
    pub gamma: Option<f64>,
    pub n_folds: usize,
    /// Index of the random partition, part of output file names
    pub iteration: usize,
    pub preprocessing: PreprocessingConfig,
    pub seed: Option<u64>,
    pub plots: bool,
    pub solver: SolverSettings,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            classes: Vec::new(),
            grid_search: false,
            train_all: false,
            downsample: false,
            exhaustive: false,
            probability: true,
            c: 1.0,
            gamma: None,
            n_folds: 5,
            iteration: 1,
            preprocessing: PreprocessingConfig::default(),
            seed: None,
            plots: true,
            solver: SolverSettings::default(),
        }
    }
}

impl ExperimentConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_json(path)
    }

    /// Write to `<output_dir>/experiment.json`
    pub fn save(&self) -> Result<PathBuf> {
        let path = self.output_dir.join(CONFIG_FILE);
        write_json(self, &path)?;
        Ok(path)
    }

    /// Reject settings no experiment can run with
    pub fn validate(&self) -> Result<()> {
        let distinct: BTreeSet<&String> = self.classes.iter().collect();
        if distinct.len() < 2 {
            return Err(SVMError::InvalidParameter(format!(
                "At least two distinct classes are required, got: {:?}",
                self.classes
            )));
        }
        if distinct.len() != self.classes.len() {
            return Err(SVMError::InvalidParameter(format!(
                "Duplicate class names: {:?}",
                self.classes
            )));
        }
        if !(self.c > 0.0 && self.c.is_finite()) {
            return Err(SVMError::InvalidParameter(format!(
                "C must be positive, got: {}",
                self.c
            )));
        }
        if let Some(gamma) = self.gamma {
            if !(gamma > 0.0 && gamma.is_finite()) {
                return Err(SVMError::InvalidParameter(format!(
                    "gamma must be positive, got: {gamma}"
                )));
            }
        }
        if self.n_folds < 2 {
            return Err(SVMError::InvalidParameter(format!(
                "At least two folds are required, got: {}",
                self.n_folds
            )));
        }
        if self.iteration == 0 {
            return Err(SVMError::InvalidParameter(
                "iteration numbering starts at 1".to_string(),
            ));
        }
        if !(self.solver.epsilon > 0.0) || self.solver.max_iterations == 0 {
            return Err(SVMError::InvalidParameter(format!(
                "Invalid solver settings: {:?}",
                self.solver
            )));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(SVMError::InvalidParameter(
                "Output directory is not set".to_string(),
            ));
        }

        if !self.grid_search && (self.train_all || self.exhaustive) {
            warn!("--train-all and --exhaustive only apply together with --grid-search");
        }
        if self.exhaustive && !self.train_all {
            warn!("--exhaustive has no effect without --train-all");
        }
        Ok(())
    }

    /// Classifier template with balanced class weights and the solver
    /// settings applied; C and gamma are set per use
    pub fn estimator(&self) -> SVC {
        SVC::new()
            .with_class_weight(ClassWeight::Balanced)
            .with_probability(self.probability)
            .with_c(self.c)
            .with_epsilon(self.solver.epsilon)
            .with_max_iterations(self.solver.max_iterations)
            .with_cache_size(self.solver.cache_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::ScalingMethod;
    use tempfile::TempDir;

    fn valid() -> ExperimentConfig {
        ExperimentConfig {
            input_dir: PathBuf::from("features"),
            output_dir: PathBuf::from("out"),
            classes: vec!["bend".into(), "pull".into()],
            ..ExperimentConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = ExperimentConfig::default();
        assert_eq!(config.n_folds, 5);
        assert_eq!(config.iteration, 1);
        assert_eq!(config.c, 1.0);
        assert!(config.probability);
        assert!(config.plots);
        assert_eq!(
            config.preprocessing.scaling,
            Some(ScalingMethod::StandardScaler)
        );
    }

    #[test]
    fn test_validate() {
        assert!(valid().validate().is_ok());

        let mut config = valid();
        config.classes = vec!["bend".into()];
        assert!(config.validate().is_err());

        let mut config = valid();
        config.classes.push("bend".into());
        assert!(config.validate().is_err());

        let mut config = valid();
        config.c = -1.0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.gamma = Some(0.0);
        assert!(config.validate().is_err());

        let mut config = valid();
        config.n_folds = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(
            &path,
            r#"{"classes": ["bend", "slide"], "C": 4.0, "grid_search": true}"#,
        )
        .unwrap();

        let config = ExperimentConfig::from_file(&path).unwrap();
        assert_eq!(config.classes, vec!["bend", "slide"]);
        assert_eq!(config.c, 4.0);
        assert!(config.grid_search);
        assert_eq!(config.n_folds, 5);
        assert_eq!(config.solver, SolverSettings::default());
    }

    #[test]
    fn test_save_round_trip() {
        let dir = TempDir::new().unwrap();
        let config = ExperimentConfig {
            output_dir: dir.path().to_path_buf(),
            seed: Some(42),
            ..valid()
        };
        let path = config.save().unwrap();
        assert!(path.ends_with(CONFIG_FILE));
        assert_eq!(ExperimentConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_estimator_template() {
        let svc = valid().estimator();
        assert_eq!(svc.class_weight(), ClassWeight::Balanced);
        assert!(svc.probability());
        assert_eq!(svc.kernel(), None);
    }
}
