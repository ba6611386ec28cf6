//! Exhaustive search over RBF-SVM hyper-parameters

use crate::api::{SupportVectorClassifier, SVC};
use crate::core::{Result, SVMError};
use crate::metrics::Scoring;
use crate::utils::logspace2;
use crate::utils::stats::{std_dev, weighted_mean};
use crate::validation::kfold::StratifiedKFold;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One (C, gamma) candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridParams {
    #[serde(rename = "C")]
    pub c: f64,
    pub gamma: f64,
}

impl fmt::Display for GridParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{'kernel': 'rbf', 'C': {}, 'gamma': {}}}",
            self.c, self.gamma
        )
    }
}

/// Cartesian product of C and gamma values
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGrid {
    pub c_range: Vec<f64>,
    pub gamma_range: Vec<f64>,
}

impl Default for ParameterGrid {
    /// C in 2^-5..2^5 (11 values), gamma in 2^-10..2^-2 (9 values)
    fn default() -> Self {
        Self {
            c_range: logspace2(-5.0, 5.0, 11),
            gamma_range: logspace2(-10.0, -2.0, 9),
        }
    }
}

impl ParameterGrid {
    pub fn new(c_range: Vec<f64>, gamma_range: Vec<f64>) -> Self {
        Self {
            c_range,
            gamma_range,
        }
    }

    /// Candidates in C-major order
    pub fn candidates(&self) -> Vec<GridParams> {
        self.c_range
            .iter()
            .flat_map(|&c| {
                self.gamma_range
                    .iter()
                    .map(move |&gamma| GridParams { c, gamma })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.c_range.len() * self.gamma_range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cross-validated score of one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridScore {
    pub params: GridParams,
    /// Mean over folds weighted by test fold size
    pub mean: f64,
    /// Standard deviation of the fold scores
    pub std: f64,
    pub fold_scores: Vec<f64>,
}

/// Grid search with stratified inner cross-validation
#[derive(Debug, Clone)]
pub struct GridSearch {
    pub grid: ParameterGrid,
    pub cv: usize,
    pub scoring: Scoring,
    pub estimator: SVC,
}

impl GridSearch {
    /// Default grid with 4 unshuffled inner folds
    pub fn new(estimator: SVC, scoring: Scoring) -> Self {
        Self {
            grid: ParameterGrid::default(),
            cv: 4,
            scoring,
            estimator,
        }
    }

    pub fn with_grid(mut self, grid: ParameterGrid) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_cv(mut self, cv: usize) -> Self {
        self.cv = cv;
        self
    }

    /// Score every candidate and refit the best one on all of `x`
    pub fn fit(&self, x: &[Vec<f64>], y: &[usize]) -> Result<GridSearchResult> {
        if self.grid.is_empty() {
            return Err(SVMError::InvalidParameter(
                "Parameter grid is empty".to_string(),
            ));
        }
        if x.len() != y.len() {
            return Err(SVMError::InvalidDataset(format!(
                "{} rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        let n_classes = y.iter().max().map(|&m| m + 1).ok_or(SVMError::EmptyDataset)?;
        let folds = StratifiedKFold::new(self.cv, false).split(y)?;

        // Inner models never need probabilities
        let inner = self.estimator.clone().with_probability(false);

        let mut scores = Vec::with_capacity(self.grid.len());
        for params in self.grid.candidates() {
            let candidate = inner.clone().with_c(params.c).with_gamma(params.gamma);
            let mut fold_scores = Vec::with_capacity(folds.len());
            let mut weights = Vec::with_capacity(folds.len());

            for fold in &folds {
                let (x_train, y_train) = select(x, y, &fold.train);
                let (x_test, y_test) = select(x, y, &fold.test);
                let model = candidate.fit(&x_train, &y_train)?;
                let y_pred = model.predict(&x_test)?;
                fold_scores.push(self.scoring.score(&y_test, &y_pred, n_classes)?);
                weights.push(fold.test.len() as f64);
            }

            let score = GridScore {
                params,
                mean: weighted_mean(&fold_scores, &weights),
                std: std_dev(&fold_scores),
                fold_scores,
            };
            debug!(
                "{}: {:.3} (+/-{:.3}) for {}",
                self.scoring,
                score.mean,
                score.std * 2.0,
                score.params
            );
            scores.push(score);
        }

        let mut best = 0;
        for (idx, score) in scores.iter().enumerate() {
            if score.mean > scores[best].mean {
                best = idx;
            }
        }
        let best_params = scores[best].params;
        let best_score = scores[best].mean;
        info!(
            "Best {} score {:.3} with C={}, gamma={}",
            self.scoring, best_score, best_params.c, best_params.gamma
        );

        let best_estimator = self
            .estimator
            .clone()
            .with_c(best_params.c)
            .with_gamma(best_params.gamma)
            .fit(x, y)?;

        Ok(GridSearchResult {
            grid: self.grid.clone(),
            scores,
            best_params,
            best_score,
            best_estimator,
        })
    }
}

fn select(x: &[Vec<f64>], y: &[usize], indices: &[usize]) -> (Vec<Vec<f64>>, Vec<usize>) {
    indices.iter().map(|&i| (x[i].clone(), y[i])).unzip()
}

/// Outcome of [`GridSearch::fit`]
#[derive(Clone)]
pub struct GridSearchResult {
    pub grid: ParameterGrid,
    /// One entry per candidate, C-major
    pub scores: Vec<GridScore>,
    pub best_params: GridParams,
    pub best_score: f64,
    /// Best candidate refitted on the full development set
    pub best_estimator: SupportVectorClassifier,
}

impl GridSearchResult {
    /// Mean scores reshaped to |C| rows by |gamma| columns
    pub fn scores_matrix(&self) -> Vec<Vec<f64>> {
        self.scores
            .chunks(self.grid.gamma_range.len().max(1))
            .map(|row| row.iter().map(|s| s.mean).collect())
            .collect()
    }
}
