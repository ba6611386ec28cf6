//! Experiment driver
//!
//! Loads the technique features, then either trains one model on all data
//! or runs stratified cross-validation with a grid search per scoring
//! metric. Every fitted transform and model is written to the output
//! directory under a prefix built from the class tag:
//!
//! ```text
//! <tag>.iter<i>.fold<k>.metric.<m>.model.json        fold model
//! <tag>.iter<i>.fold<k>.all.metric.<m>.model.json    best params, all data
//! <tag>.iter<i>.final.C_<c>.g_<g>.model.json         averaged params
//! ```

use crate::api::SupportVectorClassifier;
use crate::config::ExperimentConfig;
use crate::core::{Result, SVMError};
use crate::data::{collect_technique_files, load_features, FeatureSet};
use crate::metrics::{classification_report, ConfusionMatrix, Scoring};
use crate::persistence::SerializableModel;
use crate::preprocess::Preprocessor;
use crate::report::{plot_confusion_matrix, plot_validation_heatmap, ReportWriter};
use crate::utils::{logspace2, seeded_rng, with_suffix};
use crate::validation::{fold_file_path, load_or_create_folds, GridParams, GridSearch};
use log::{debug, error, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Held-out outcome of one (fold, metric) search
#[derive(Debug, Clone, Serialize)]
pub struct FoldResult {
    /// 1-based fold number
    pub fold: usize,
    pub scoring: Scoring,
    pub best_params: GridParams,
    /// Cross-validated score of `best_params` on the training part
    pub best_score: f64,
    pub test_accuracy: f64,
    /// `scoring` evaluated on the test part
    pub test_score: f64,
    pub model_path: PathBuf,
    pub all_data_model_path: PathBuf,
}

/// What an experiment produced
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentSummary {
    pub tag: String,
    pub n_samples: usize,
    pub n_features: usize,
    pub class_counts: BTreeMap<String, usize>,
    pub fold_results: Vec<FoldResult>,
    /// Mean of the best C and gamma over all searches
    pub averaged_params: Option<GridParams>,
    /// Training accuracy of the single model (no grid search)
    pub training_accuracy: Option<f64>,
    pub model_paths: Vec<PathBuf>,
    pub report_path: PathBuf,
}

pub struct Experiment {
    config: ExperimentConfig,
}

impl Experiment {
    pub fn new(config: ExperimentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn run(&self) -> Result<ExperimentSummary> {
        let config = &self.config;
        fs::create_dir_all(&config.output_dir)?;
        info!("Output directory: {}", config.output_dir.display());
        config.save()?;

        let mut rng = seeded_rng(config.seed);
        let files = collect_technique_files(&config.input_dir, &config.classes)?;
        let data = load_features(&files, config.downsample, &mut rng)?;

        let mut report = ReportWriter::create(&config.output_dir)?;
        report.write_settings(
            &data.class_counts,
            data.n_features,
            &config.preprocessing.methods(),
            config.downsample,
        )?;

        let mut summary = ExperimentSummary {
            tag: data.tag.clone(),
            n_samples: data.x.len(),
            n_features: data.n_features,
            class_counts: data.class_counts.clone(),
            fold_results: Vec::new(),
            averaged_params: None,
            training_accuracy: None,
            model_paths: Vec::new(),
            report_path: report.path().to_path_buf(),
        };

        if config.grid_search {
            let folds = load_or_create_folds(
                fold_file_path(&config.output_dir, &data.tag, config.iteration, config.n_folds),
                &data.y,
                config.n_folds,
                &mut rng,
            )?;
            for (k, fold) in folds.iter().enumerate() {
                report.begin_fold(k + 1)?;
                info!("Classification on fold {}...", k + 1);
                for scoring in Scoring::ALL {
                    let result =
                        self.evaluate_fold(&data, k + 1, &fold.train, &fold.test, scoring, &mut report)?;
                    summary.model_paths.push(result.model_path.clone());
                    summary.model_paths.push(result.all_data_model_path.clone());
                    summary.fold_results.push(result);
                }
            }

            if config.train_all {
                let averaged = average_params(&summary.fold_results)?;
                report.line(&format!("C_final: {}", averaged.c))?;
                report.line(&format!("gamma_final: {}", averaged.gamma))?;
                let paths = self.train_final(&data, averaged, &mut report)?;
                summary.averaged_params = Some(averaged);
                summary.model_paths.extend(paths);
            }
        } else {
            let (accuracy, path) = self.train_single(&data, &mut report)?;
            summary.training_accuracy = Some(accuracy);
            summary.model_paths.push(path);
        }

        report.flush()?;
        Ok(summary)
    }

    fn prefix(&self, tag: &str, rest: &str) -> PathBuf {
        self.config
            .output_dir
            .join(format!("{tag}.iter{}{rest}", self.config.iteration))
    }

    /// Train with the configured C and gamma on all data
    fn train_single(&self, data: &FeatureSet, report: &mut ReportWriter) -> Result<(f64, PathBuf)> {
        let prefix = self.config.output_dir.join(&data.tag);
        let (_, x) = Preprocessor::fit_transform(
            &data.x,
            self.config.preprocessing,
            Some(prefix.as_path()),
        )?;

        let mut estimator = self.config.estimator();
        if let Some(gamma) = self.config.gamma {
            estimator = estimator.with_gamma(gamma);
        }
        let model = estimator.fit(&x, &data.y)?;
        let accuracy = model.score(&x, &data.y)?;
        info!("Training accuracy: {accuracy:.3}");
        report.line(&format!(
            "Trained on all data with C={}, gamma={}",
            model.c(),
            model.kernel().gamma().unwrap_or_default()
        ))?;
        report.line(&format!("Training accuracy: {accuracy:.3}"))?;

        let path = with_suffix(&prefix, ".model.json");
        self.save_model(&model, data, &path)?;
        Ok((accuracy, path))
    }

    fn evaluate_fold(
        &self,
        data: &FeatureSet,
        fold: usize,
        train: &[usize],
        test: &[usize],
        scoring: Scoring,
        report: &mut ReportWriter,
    ) -> Result<FoldResult> {
        let config = &self.config;
        let class_names = data.class_names();
        let (x_train_raw, y_train) = data.subset(train);
        let (x_test_raw, y_test) = data.subset(test);

        info!("# Tuning hyper-parameters for {scoring}");
        let prefix = self.prefix(&data.tag, &format!(".fold{fold}.metric.{scoring}"));
        let (preprocessor, x_train) = Preprocessor::fit_transform(
            &x_train_raw,
            config.preprocessing,
            Some(prefix.as_path()),
        )?;

        let search = GridSearch::new(config.estimator(), scoring).fit(&x_train, &y_train)?;
        report.write_grid_search(scoring, &search)?;
        info!("Best parameters: {} ({:.3})", search.best_params, search.best_score);
        for score in &search.scores {
            debug!(
                "{:.3} (+/-{:.3}) for {}",
                score.mean,
                score.std * 2.0,
                score.params
            );
        }
        self.plot(|| {
            plot_validation_heatmap(
                &search.scores_matrix(),
                &search.grid.c_range,
                &search.grid.gamma_range,
                with_suffix(&prefix, ".validation_acc.heatmap.png"),
            )
        });

        // Test rows go through the transforms fitted on the training rows
        let x_test = preprocessor.transform(&x_test_raw)?;
        let y_pred = search.best_estimator.predict(&x_test)?;

        let cm = ConfusionMatrix::new(&y_test, &y_pred, data.n_classes())?;
        let raw: Vec<Vec<f64>> = cm
            .matrix()
            .iter()
            .map(|row| row.iter().map(|&v| v as f64).collect())
            .collect();
        self.plot(|| {
            plot_confusion_matrix(
                &raw,
                &class_names,
                "Confusion matrix",
                with_suffix(&prefix, ".cm.png"),
            )
        });
        self.plot(|| {
            plot_confusion_matrix(
                &cm.normalized(),
                &class_names,
                "Normalized confusion matrix",
                with_suffix(&prefix, ".norm.cm.png"),
            )
        });

        let text = classification_report(&y_test, &y_pred, &class_names)?;
        report.write_evaluation(&text, cm.accuracy())?;
        let test_score = scoring.score(&y_test, &y_pred, data.n_classes())?;

        let model_path = with_suffix(&prefix, ".model.json");
        self.save_model(&search.best_estimator, data, &model_path)?;

        // Best parameters retrained on every instance
        let all_prefix = self.prefix(&data.tag, &format!(".fold{fold}.all.metric.{scoring}"));
        let (_, x_all) =
            Preprocessor::fit_transform(&data.x, config.preprocessing, Some(all_prefix.as_path()))?;
        let model_all = config
            .estimator()
            .with_c(search.best_params.c)
            .with_gamma(search.best_params.gamma)
            .fit(&x_all, &data.y)?;
        let all_data_model_path = with_suffix(&all_prefix, ".model.json");
        self.save_model(&model_all, data, &all_data_model_path)?;

        Ok(FoldResult {
            fold,
            scoring,
            best_params: search.best_params,
            best_score: search.best_score,
            test_accuracy: cm.accuracy(),
            test_score,
            model_path,
            all_data_model_path,
        })
    }

    /// Models on all data with the averaged parameters, or their 3x3
    /// neighbourhood on a base-2 log scale when exhaustive
    fn train_final(
        &self,
        data: &FeatureSet,
        averaged: GridParams,
        report: &mut ReportWriter,
    ) -> Result<Vec<PathBuf>> {
        let prefix = self.prefix(&data.tag, ".final");
        let (_, x) = Preprocessor::fit_transform(
            &data.x,
            self.config.preprocessing,
            Some(prefix.as_path()),
        )?;

        let (c_range, gamma_range) = if self.config.exhaustive {
            let c_range = logspace2(averaged.c.log2() - 1.0, averaged.c.log2() + 1.0, 3);
            let gamma_range = logspace2(averaged.gamma.log2() - 1.0, averaged.gamma.log2() + 1.0, 3);
            report.line(&format!("C_final_range: {c_range:?}"))?;
            report.line(&format!("g_final_range: {gamma_range:?}"))?;
            (c_range, gamma_range)
        } else {
            (vec![averaged.c], vec![averaged.gamma])
        };

        let mut paths = Vec::with_capacity(c_range.len() * gamma_range.len());
        for &c in &c_range {
            for &gamma in &gamma_range {
                let model = self
                    .config
                    .estimator()
                    .with_c(c)
                    .with_gamma(gamma)
                    .fit(&x, &data.y)?;
                let path = with_suffix(&prefix, &format!(".C_{c}.g_{gamma}.model.json"));
                self.save_model(&model, data, &path)?;
                info!("Saved final model {}", path.display());
                paths.push(path);
            }
        }
        Ok(paths)
    }

    fn save_model(&self, model: &SupportVectorClassifier, data: &FeatureSet, path: &Path) -> Result<()> {
        SerializableModel::from_classifier(model)
            .with_class_names(data.class_names())
            .with_preprocessing(self.config.preprocessing)
            .save_to_file(path)
    }

    /// Plot failures are logged, never fatal
    fn plot<F: FnOnce() -> Result<()>>(&self, draw: F) {
        if !self.config.plots {
            return;
        }
        if let Err(e) = draw() {
            error!("Plotting failed: {e}");
        }
    }
}

/// Mean of the best C and gamma over every search
pub fn average_params(results: &[FoldResult]) -> Result<GridParams> {
    if results.is_empty() {
        return Err(SVMError::InvalidParameter(
            "No grid search results to average".to_string(),
        ));
    }
    let n = results.len() as f64;
    Ok(GridParams {
        c: results.iter().map(|r| r.best_params.c).sum::<f64>() / n,
        gamma: results.iter().map(|r| r.best_params.gamma).sum::<f64>() / n,
    })
}
