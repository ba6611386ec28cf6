//! Integration tests for the gtsvm library
//!
//! These tests run whole experiments on small synthetic feature files and
//! check the files they leave behind.

use gtsvm::config::{ExperimentConfig, CONFIG_FILE};
use gtsvm::data::{collect_technique_files, load_features, read_feature_file};
use gtsvm::persistence::SerializableModel;
use gtsvm::pipeline::Experiment;
use gtsvm::preprocess::{PreprocessingConfig, Preprocessor, ScalingMethod};
use gtsvm::report::REPORT_FILE;
use gtsvm::utils::seeded_rng;
use gtsvm::validation::fold_file_path;
use gtsvm::Scoring;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

const CENTERS: [(&str, [f64; 3]); 3] = [
    ("bend", [0.0, 0.0, 1.0]),
    ("normal", [4.0, 0.5, 0.0]),
    ("slide", [0.5, 4.0, 2.0]),
];

/// Write `n` jittered instances around `center` to `<dir>/<name>`
fn write_cluster(dir: &Path, name: &str, center: [f64; 3], n: usize, with_nan: bool) {
    let mut file = fs::File::create(dir.join(name)).expect("Failed to create feature file");
    writeln!(file, "# synthetic features").expect("Failed to write");
    for i in 0..n {
        let t = i as f64;
        let row = [
            center[0] + 0.3 * (t * 1.7).sin(),
            center[1] + 0.3 * (t * 2.3).cos(),
            center[2] + 0.2 * (t * 0.9).sin(),
        ];
        if with_nan && i == 0 {
            writeln!(file, "nan {} {}", row[1], row[2]).expect("Failed to write");
        } else {
            writeln!(file, "{} {} {}", row[0], row[1], row[2]).expect("Failed to write");
        }
    }
}

fn feature_dir(per_class: usize) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    for (name, center) in CENTERS {
        write_cluster(
            dir.path(),
            &format!("song1.{name}.raw.feature"),
            center,
            per_class,
            name == "bend",
        );
    }
    // Different suffix, must be ignored
    write_cluster(dir.path(), "song1.bend.mean.feature", [9.0, 9.0, 9.0], 5, false);
    dir
}

fn classes() -> Vec<String> {
    CENTERS.iter().map(|(name, _)| name.to_string()).collect()
}

#[test]
fn test_single_model_workflow() {
    let input = feature_dir(12);
    let output = TempDir::new().expect("Failed to create temp dir");

    let config = ExperimentConfig {
        input_dir: input.path().to_path_buf(),
        output_dir: output.path().to_path_buf(),
        classes: classes(),
        plots: false,
        seed: Some(7),
        ..ExperimentConfig::default()
    };
    let summary = Experiment::new(config)
        .expect("Config should be valid")
        .run()
        .expect("Experiment should succeed");

    assert_eq!(summary.tag, "bend_12_normal_12_slide_12");
    assert_eq!(summary.n_samples, 36);
    assert_eq!(summary.n_features, 3);
    assert!(summary.fold_results.is_empty());
    let accuracy = summary.training_accuracy.expect("Training accuracy expected");
    assert!(accuracy >= 0.95, "Training accuracy too low: {accuracy}");

    let prefix = output.path().join(&summary.tag);
    let model_path = output.path().join(format!("{}.model.json", summary.tag));
    assert_eq!(summary.model_paths, vec![model_path.clone()]);
    assert!(output.path().join(CONFIG_FILE).exists());
    assert!(output
        .path()
        .join(format!("{}.Imputer.json", summary.tag))
        .exists());
    assert!(output
        .path()
        .join(format!("{}.StandardScaler.scaler.json", summary.tag))
        .exists());

    // Reload model and transforms, classify the raw files again
    let saved = SerializableModel::load_from_file(&model_path).expect("Model should load");
    assert_eq!(saved.class_names, classes());
    assert_eq!(
        saved.preprocessing,
        Some(PreprocessingConfig::default())
    );
    let model = saved.to_classifier().expect("Model should rebuild");
    assert!(model.has_probability());

    let preprocessor = Preprocessor::load_from_prefix(PreprocessingConfig::default(), &prefix)
        .expect("Transforms should load");
    let raw = read_feature_file(input.path().join("song1.slide.raw.feature")).unwrap();
    let x = preprocessor.transform(&raw).unwrap();
    let predictions = model.predict(&x).unwrap();
    let correct = predictions.iter().filter(|&&label| label == 2).count();
    assert!(correct >= 11, "Only {correct} of 12 slides recognised");

    let proba = model.predict_proba(&x).unwrap();
    for row in &proba {
        assert_eq!(row.len(), 3);
        assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    }

    let report = fs::read_to_string(output.path().join(REPORT_FILE)).unwrap();
    assert!(report.contains("Dimensions of feature vector: 3"));
    assert!(report.contains("StandardScaler"));
}

#[test]
fn test_grid_search_workflow() {
    let input = feature_dir(12);
    let output = TempDir::new().expect("Failed to create temp dir");

    let config = ExperimentConfig {
        input_dir: input.path().to_path_buf(),
        output_dir: output.path().to_path_buf(),
        classes: classes(),
        grid_search: true,
        train_all: true,
        exhaustive: true,
        probability: false,
        n_folds: 2,
        plots: false,
        seed: Some(42),
        ..ExperimentConfig::default()
    };
    let summary = Experiment::new(config.clone())
        .expect("Config should be valid")
        .run()
        .expect("Experiment should succeed");

    // Two folds times two metrics
    assert_eq!(summary.fold_results.len(), 4);
    for (i, result) in summary.fold_results.iter().enumerate() {
        assert_eq!(result.fold, i / 2 + 1);
        assert_eq!(result.scoring, Scoring::ALL[i % 2]);
        assert!(result.test_accuracy >= 0.7, "fold {} accuracy {}", result.fold, result.test_accuracy);
        assert!(result.model_path.exists());
        assert!(result.all_data_model_path.exists());
    }
    let first = output
        .path()
        .join(format!("{}.iter1.fold1.metric.f1.model.json", summary.tag));
    assert_eq!(summary.fold_results[0].model_path, first);

    // 4 fold models, 4 all-data models, 3x3 final models
    assert_eq!(summary.model_paths.len(), 17);
    let averaged = summary.averaged_params.expect("Averaged parameters expected");
    assert!(averaged.c > 0.0 && averaged.gamma > 0.0);
    let final_prefix = format!("{}.iter1.final.C_", summary.tag);
    let final_models: Vec<_> = fs::read_dir(output.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            name.starts_with(&final_prefix) && name.ends_with(".model.json")
        })
        .collect();
    assert_eq!(final_models.len(), 9);
    let final_saved = SerializableModel::load_from_file(&final_models[0]).unwrap();
    assert!(!final_saved.metadata.training_params.probability);
    assert_eq!(final_saved.class_names, classes());

    let report = fs::read_to_string(&summary.report_path).unwrap();
    assert!(report.contains("Classification on fold 2..."));
    assert!(report.contains("# Tuning hyper-parameters for precision"));
    assert!(report.contains("avg / total"));
    assert!(report.contains("C_final:"));

    // A second run reuses the stored partition
    let fold_file = fold_file_path(output.path(), &summary.tag, 1, 2);
    let stored = fs::read_to_string(&fold_file).expect("Fold file should exist");
    let rerun = Experiment::new(ExperimentConfig {
        seed: Some(1234),
        train_all: false,
        exhaustive: false,
        ..config
    })
    .unwrap()
    .run()
    .unwrap();
    assert_eq!(fs::read_to_string(&fold_file).unwrap(), stored);
    for (a, b) in summary.fold_results.iter().zip(rerun.fold_results.iter()) {
        assert_eq!(a.test_accuracy, b.test_accuracy);
    }
}

#[test]
fn test_downsampled_loading() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    write_cluster(dir.path(), "a.bend.raw.feature", [0.0; 3], 20, false);
    write_cluster(dir.path(), "a.slide.raw.feature", [3.0; 3], 7, false);

    let files = collect_technique_files(dir.path(), &["slide", "bend"]).unwrap();
    let mut rng = seeded_rng(Some(3));
    let set = load_features(&files, true, &mut rng).unwrap();
    assert_eq!(set.class_counts["bend"], 7);
    assert_eq!(set.class_counts["slide"], 7);
    assert_eq!(set.tag, "bend_7_slide_7");
    assert_eq!(set.class_names(), vec!["bend", "slide"]);
}

#[test]
fn test_robust_scaler_with_pca() {
    let input = feature_dir(10);
    let output = TempDir::new().expect("Failed to create temp dir");
    let preprocessing = PreprocessingConfig {
        scaling: Some(ScalingMethod::RobustScaler),
        pca: true,
    };

    let summary = Experiment::new(ExperimentConfig {
        input_dir: input.path().to_path_buf(),
        output_dir: output.path().to_path_buf(),
        classes: classes(),
        preprocessing,
        plots: false,
        ..ExperimentConfig::default()
    })
    .unwrap()
    .run()
    .unwrap();

    let prefix = output.path().join(&summary.tag);
    assert!(output
        .path()
        .join(format!("{}.RobustScaler.scaler.json", summary.tag))
        .exists());
    assert!(output.path().join(format!("{}.PCA.json", summary.tag)).exists());
    let preprocessor = Preprocessor::load_from_prefix(preprocessing, &prefix).unwrap();
    assert_eq!(preprocessor.output_dim(3), 3);
}

#[test]
fn test_error_handling() {
    let output = TempDir::new().expect("Failed to create temp dir");

    // Missing input directory
    let result = Experiment::new(ExperimentConfig {
        input_dir: output.path().join("nope"),
        output_dir: output.path().to_path_buf(),
        classes: classes(),
        plots: false,
        ..ExperimentConfig::default()
    })
    .unwrap()
    .run();
    assert!(result.is_err());

    // No matching files at all
    let empty = TempDir::new().expect("Failed to create temp dir");
    let result = Experiment::new(ExperimentConfig {
        input_dir: empty.path().to_path_buf(),
        output_dir: output.path().to_path_buf(),
        classes: classes(),
        plots: false,
        ..ExperimentConfig::default()
    })
    .unwrap()
    .run();
    assert!(result.is_err());

    // A single class is not an experiment
    assert!(Experiment::new(ExperimentConfig {
        input_dir: empty.path().to_path_buf(),
        output_dir: output.path().to_path_buf(),
        classes: vec!["bend".to_string()],
        ..ExperimentConfig::default()
    })
    .is_err());
}
