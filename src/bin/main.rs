//! gtsvm Command Line Interface
//!
//! Trains technique classifiers from feature files and applies saved models
//! to new feature files.

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use gtsvm::config::ExperimentConfig;
use gtsvm::core::{Result, SVMError};
use gtsvm::data::read_feature_file;
use gtsvm::persistence::SerializableModel;
use gtsvm::pipeline::Experiment;
use gtsvm::preprocess::{PreprocessingConfig, Preprocessor, ScalingMethod};
use log::{error, info, warn};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "gtsvm")]
#[command(about = "Guitar playing technique classification with SVMs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train technique classifiers from feature files
    Train(TrainArgs),
    /// Classify instances with a trained model
    Predict(PredictArgs),
    /// Display model information
    Info(InfoArgs),
}

#[derive(Args)]
struct TrainArgs {
    /// Directory holding the technique feature files
    input_features: PathBuf,

    /// Directory for models, transforms, report and plots
    output_dir: PathBuf,

    /// Techniques to classify, e.g. bend pull hamm slide normal
    #[arg(required = true)]
    classes: Vec<String>,

    /// Tune C and gamma by grid search over stratified folds
    #[arg(long)]
    grid_search: bool,

    /// Retrain on all data with the averaged best parameters
    #[arg(long)]
    train_all: bool,

    /// Subsample every class to the size of the smallest one
    #[arg(long)]
    downsample: bool,

    /// Also train the 3x3 neighbourhood of the averaged parameters
    #[arg(long)]
    exhaustive: bool,

    /// Skip probability calibration
    #[arg(long)]
    no_proba: bool,

    /// Regularization parameter C
    #[arg(short = 'C', long)]
    c: Option<f64>,

    /// RBF kernel gamma (default 1 / n_features)
    #[arg(long)]
    gamma: Option<f64>,

    /// Number of cross-validation folds
    #[arg(short, long)]
    fold: Option<usize>,

    /// Index of the random partition
    #[arg(short, long)]
    iteration: Option<usize>,

    /// Feature scaling applied after imputation
    #[arg(long)]
    scaling: Option<CliScaling>,

    /// Reduce dimensionality with PCA after scaling
    #[arg(long)]
    pca: bool,

    /// Seed for subsampling and fold assignment
    #[arg(long)]
    seed: Option<u64>,

    /// Do not render confusion matrices and heatmaps
    #[arg(long)]
    no_plots: bool,

    /// JSON experiment config; command line flags override it
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliScaling {
    /// Standardize each matrix with its own mean and deviation
    #[value(name = "scale")]
    Scale,
    /// Center and scale each matrix by its own median and IQR
    #[value(name = "robust-scale")]
    RobustScale,
    /// Fitted mean and deviation, reused for new data
    #[value(name = "standard-scaler")]
    StandardScaler,
    /// Fitted median and IQR, reused for new data
    #[value(name = "robust-scaler")]
    RobustScaler,
    /// No scaling
    #[value(name = "none")]
    None,
}

impl From<CliScaling> for Option<ScalingMethod> {
    fn from(cli_scaling: CliScaling) -> Self {
        match cli_scaling {
            CliScaling::Scale => Some(ScalingMethod::Scale),
            CliScaling::RobustScale => Some(ScalingMethod::RobustScale),
            CliScaling::StandardScaler => Some(ScalingMethod::StandardScaler),
            CliScaling::RobustScaler => Some(ScalingMethod::RobustScaler),
            CliScaling::None => None,
        }
    }
}

#[derive(Args)]
struct PredictArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    /// Fitted scaler file, required by stateful scalers
    #[arg(long)]
    scaler: Option<PathBuf>,

    /// Fitted imputer file; medians of the input are used without it
    #[arg(long)]
    imputer: Option<PathBuf>,

    /// Fitted PCA file, required when the model was trained with PCA
    #[arg(long)]
    pca: Option<PathBuf>,

    /// Feature file to classify
    #[arg(long)]
    data: PathBuf,

    /// Print class probabilities
    #[arg(long)]
    proba: bool,
}

#[derive(Args)]
struct InfoArgs {
    /// Model file
    model: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Train(args) => train_command(args),
        Commands::Predict(args) => predict_command(args),
        Commands::Info(args) => info_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn experiment_config(args: TrainArgs) -> Result<ExperimentConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading experiment config from: {path:?}");
            ExperimentConfig::from_file(path)?
        }
        None => ExperimentConfig::default(),
    };

    config.input_dir = args.input_features;
    config.output_dir = args.output_dir;
    config.classes = args.classes;
    config.grid_search |= args.grid_search;
    config.train_all |= args.train_all;
    config.downsample |= args.downsample;
    config.exhaustive |= args.exhaustive;
    if args.no_proba {
        config.probability = false;
    }
    if args.no_plots {
        config.plots = false;
    }
    if let Some(c) = args.c {
        config.c = c;
    }
    if args.gamma.is_some() {
        config.gamma = args.gamma;
    }
    if let Some(fold) = args.fold {
        config.n_folds = fold;
    }
    if let Some(iteration) = args.iteration {
        config.iteration = iteration;
    }
    if let Some(scaling) = args.scaling {
        config.preprocessing.scaling = scaling.into();
    }
    config.preprocessing.pca |= args.pca;
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    Ok(config)
}

fn train_command(args: TrainArgs) -> Result<()> {
    let config = experiment_config(args)?;
    info!("Training technique classifier...");
    info!("Input features: {:?}", config.input_dir);
    info!("Classes: {}", config.classes.join(", "));

    let summary = Experiment::new(config)?.run()?;

    println!("=== Experiment Summary ===");
    println!("Tag: {}", summary.tag);
    println!(
        "Samples: {} ({} features)",
        summary.n_samples, summary.n_features
    );
    for (name, count) in &summary.class_counts {
        println!("  {name}: {count}");
    }
    if let Some(accuracy) = summary.training_accuracy {
        println!("Training accuracy: {:.2}%", accuracy * 100.0);
    }
    for result in &summary.fold_results {
        println!(
            "Fold {} [{}]: best {} ({:.3}), test accuracy {:.2}%",
            result.fold,
            result.scoring,
            result.best_params,
            result.best_score,
            result.test_accuracy * 100.0
        );
    }
    if let Some(params) = &summary.averaged_params {
        println!("Averaged parameters: C={}, gamma={}", params.c, params.gamma);
    }
    println!("Models written: {}", summary.model_paths.len());
    println!("Report: {}", summary.report_path.display());
    Ok(())
}

fn predict_command(args: PredictArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let serializable_model = SerializableModel::load_from_file(&args.model)?;
    let model = serializable_model.to_classifier()?;

    let preprocessing = serializable_model.preprocessing.unwrap_or_else(|| {
        warn!("Model does not record its preprocessing, assuming the default");
        PreprocessingConfig::default()
    });
    if args.imputer.is_none() {
        warn!("No imputer file given, imputing with medians of the input");
    }
    let preprocessor = Preprocessor::load(
        preprocessing,
        args.imputer.as_deref(),
        args.scaler.as_deref(),
        args.pca.as_deref(),
    )?;

    info!("Loading prediction data from: {:?}", args.data);
    let raw = read_feature_file(&args.data)?;
    if raw.is_empty() {
        return Err(SVMError::EmptyDataset);
    }
    let x = preprocessor.transform(&raw)?;

    info!(
        "Making predictions using model with {} support vectors",
        serializable_model.metadata.n_support_vectors
    );
    let predictions = model.predict(&x)?;
    let probabilities = if args.proba {
        Some(model.predict_proba(&x)?)
    } else {
        None
    };

    let names: Vec<String> = model
        .classes()
        .iter()
        .map(|&label| serializable_model.class_name(label))
        .collect();

    println!("# Predictions for {} samples", predictions.len());
    match &probabilities {
        Some(_) => println!("# Format: sample_index technique {}", names.join(" ")),
        None => println!("# Format: sample_index technique"),
    }
    for (i, &label) in predictions.iter().enumerate() {
        let name = serializable_model.class_name(label);
        match &probabilities {
            Some(proba) => {
                let values: Vec<String> = proba[i].iter().map(|p| format!("{p:.6}")).collect();
                println!("{i} {name} {}", values.join(" "));
            }
            None => println!("{i} {name}"),
        }
    }

    Ok(())
}

fn info_command(args: InfoArgs) -> Result<()> {
    let serializable_model = SerializableModel::load_from_file(&args.model)?;
    serializable_model.print_summary();
    Ok(())
}
