//! Model serialization and persistence
//!
//! Trained classifiers are written as pretty-printed JSON so that the CLI
//! can reload them for prediction.

use crate::api::{PairwiseMachine, SupportVectorClassifier};
use crate::core::{Result, SVMError, SVMModel, Sample, SparseVector};
use crate::kernel::KernelType;
use crate::optimizer::TrainedSVM;
use crate::preprocess::PreprocessingConfig;
use crate::probability::PlattScaling;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

/// Serializable representation of a trained multi-class model
#[derive(Serialize, Deserialize)]
pub struct SerializableModel {
    /// Class labels, ascending
    pub classes: Vec<usize>,
    /// Technique name of each class, if known
    #[serde(default)]
    pub class_names: Vec<String>,
    pub kernel: KernelType,
    pub n_features: usize,
    /// Per-class multiplier of C
    pub class_weights: Vec<f64>,
    pub machines: Vec<SerializableMachine>,
    /// Preprocessing the model's inputs went through
    #[serde(default)]
    pub preprocessing: Option<PreprocessingConfig>,
    pub metadata: ModelMetadata,
}

/// One pairwise binary machine
#[derive(Serialize, Deserialize, Clone)]
pub struct SerializableMachine {
    /// Index into `classes` voted for by a positive decision
    pub positive: usize,
    /// Index into `classes` voted for by a negative decision
    pub negative: usize,
    /// Dense support vectors
    pub support_vectors: Vec<Vec<f64>>,
    /// Alpha values times labels (alpha_i * y_i)
    pub alpha_y: Vec<f64>,
    pub bias: f64,
    pub platt: Option<PlattScaling>,
}

/// Model metadata for tracking and validation
#[derive(Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Library version used to create the model
    pub library_version: String,
    /// Support vectors summed over machines
    pub n_support_vectors: usize,
    /// Training parameters used
    pub training_params: TrainingParams,
    /// Creation timestamp
    pub created_at: String,
}

/// Training parameters for reference
#[derive(Serialize, Deserialize)]
pub struct TrainingParams {
    pub c: f64,
    pub gamma: Option<f64>,
    pub probability: bool,
}

impl SerializableMachine {
    fn from_machine(machine: &PairwiseMachine, n_features: usize) -> Self {
        let model = &machine.model;
        Self {
            positive: machine.positive,
            negative: machine.negative,
            support_vectors: model
                .support_vectors()
                .iter()
                .map(|sv| sv.features.to_dense(n_features))
                .collect(),
            alpha_y: model
                .alpha_values()
                .iter()
                .zip(model.support_vectors().iter())
                .map(|(&alpha, sv)| alpha * sv.label)
                .collect(),
            bias: model.bias(),
            platt: machine.platt,
        }
    }

    fn to_machine(&self, kernel: &Arc<KernelType>) -> Result<PairwiseMachine> {
        if self.support_vectors.len() != self.alpha_y.len() {
            return Err(SVMError::SerializationError(format!(
                "{} support vectors but {} coefficients",
                self.support_vectors.len(),
                self.alpha_y.len()
            )));
        }
        let support_vectors: Vec<Sample> = self
            .support_vectors
            .iter()
            .zip(self.alpha_y.iter())
            .map(|(row, &ay)| {
                let label = if ay >= 0.0 { 1.0 } else { -1.0 };
                Sample::new(SparseVector::from_dense(row), label)
            })
            .collect();
        let alpha = self.alpha_y.iter().map(|ay| ay.abs()).collect();

        Ok(PairwiseMachine {
            positive: self.positive,
            negative: self.negative,
            model: TrainedSVM::from_parts(Arc::clone(kernel), support_vectors, alpha, self.bias),
            platt: self.platt,
        })
    }
}

impl SerializableModel {
    /// Create a serializable model from a trained classifier
    pub fn from_classifier(model: &SupportVectorClassifier) -> Self {
        let machines = model
            .machines()
            .iter()
            .map(|m| SerializableMachine::from_machine(m, model.n_features()))
            .collect();

        Self {
            classes: model.classes().to_vec(),
            class_names: Vec::new(),
            kernel: model.kernel(),
            n_features: model.n_features(),
            class_weights: model.class_weights().to_vec(),
            machines,
            preprocessing: None,
            metadata: ModelMetadata {
                library_version: crate::VERSION.to_string(),
                n_support_vectors: model.n_support_vectors(),
                training_params: TrainingParams {
                    c: model.c(),
                    gamma: model.kernel().gamma(),
                    probability: model.has_probability(),
                },
                created_at: chrono::Utc::now().to_rfc3339(),
            },
        }
    }

    pub fn with_class_names(mut self, class_names: Vec<String>) -> Self {
        self.class_names = class_names;
        self
    }

    pub fn with_preprocessing(mut self, preprocessing: PreprocessingConfig) -> Self {
        self.preprocessing = Some(preprocessing);
        self
    }

    /// Save model to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path).map_err(SVMError::IoError)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Load model from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SVMError::MissingFile(path.to_path_buf()),
            _ => SVMError::IoError(e),
        })?;
        let reader = BufReader::new(file);
        let model = serde_json::from_reader(reader)?;
        Ok(model)
    }

    /// Rebuild the classifier
    pub fn to_classifier(&self) -> Result<SupportVectorClassifier> {
        if let Some(row) = self
            .machines
            .iter()
            .flat_map(|m| m.support_vectors.iter())
            .find(|row| row.len() != self.n_features)
        {
            return Err(SVMError::DimensionMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }

        let kernel = Arc::new(self.kernel);
        let machines = self
            .machines
            .iter()
            .map(|m| m.to_machine(&kernel))
            .collect::<Result<Vec<_>>>()?;

        SupportVectorClassifier::from_parts(
            self.classes.clone(),
            self.kernel,
            self.metadata.training_params.c,
            self.class_weights.clone(),
            machines,
            self.n_features,
        )
    }

    /// Display name of a class label
    pub fn class_name(&self, label: usize) -> String {
        self.classes
            .iter()
            .position(|&c| c == label)
            .and_then(|i| self.class_names.get(i))
            .cloned()
            .unwrap_or_else(|| label.to_string())
    }

    /// Print model summary
    pub fn print_summary(&self) {
        println!("=== SVM Model Summary ===");
        println!("Kernel Type: {}", self.kernel.name());
        if let Some(gamma) = self.kernel.gamma() {
            println!("Gamma: {gamma}");
        }
        println!("Classes: {}", self.classes.len());
        for (i, &label) in self.classes.iter().enumerate() {
            println!(
                "  {}: {} (weight {:.4})",
                label,
                self.class_name(label),
                self.class_weights.get(i).copied().unwrap_or(1.0)
            );
        }
        println!("Feature Dimension: {}", self.n_features);
        println!("Pairwise Machines: {}", self.machines.len());
        println!("Support Vectors: {}", self.metadata.n_support_vectors);
        if let Some(preprocessing) = &self.preprocessing {
            println!("Preprocessing: {}", preprocessing.methods().join(", "));
        }
        println!("Library Version: {}", self.metadata.library_version);
        println!("Created: {}", self.metadata.created_at);
        println!("Training Parameters:");
        println!("  C: {}", self.metadata.training_params.c);
        println!(
            "  Probability: {}",
            self.metadata.training_params.probability
        );
    }
}
