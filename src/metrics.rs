//! Classification metrics
//!
//! Confusion matrices, per-class precision/recall/F1 and their
//! support-weighted averages, plus the text classification report.

use crate::core::{Result, SVMError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

/// Counts of (true, predicted) label pairs; rows are true labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    matrix: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Build over the label set `0..n_classes`
    pub fn new(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(SVMError::DimensionMismatch {
                expected: y_true.len(),
                actual: y_pred.len(),
            });
        }
        let mut matrix = vec![vec![0; n_classes]; n_classes];
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            if t >= n_classes || p >= n_classes {
                return Err(SVMError::InvalidLabel(t.max(p) as f64));
            }
            matrix[t][p] += 1;
        }
        Ok(Self { matrix })
    }

    pub fn n_classes(&self) -> usize {
        self.matrix.len()
    }

    pub fn matrix(&self) -> &[Vec<usize>] {
        &self.matrix
    }

    pub fn get(&self, true_label: usize, predicted: usize) -> usize {
        self.matrix[true_label][predicted]
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    /// Rows divided by their sums; empty rows stay zero
    pub fn normalized(&self) -> Vec<Vec<f64>> {
        self.matrix
            .iter()
            .map(|row| {
                let sum: usize = row.iter().sum();
                row.iter()
                    .map(|&v| if sum == 0 { 0.0 } else { v as f64 / sum as f64 })
                    .collect()
            })
            .collect()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.n_classes()).map(|i| self.matrix[i][i]).sum();
        correct as f64 / total as f64
    }

    /// Number of true instances of `class`
    pub fn support(&self, class: usize) -> usize {
        self.matrix[class].iter().sum()
    }

    /// TP / (TP + FP), 0 when nothing was predicted as `class`
    pub fn precision(&self, class: usize) -> f64 {
        let predicted: usize = self.matrix.iter().map(|row| row[class]).sum();
        ratio(self.matrix[class][class], predicted)
    }

    /// TP / (TP + FN), 0 when `class` has no support
    pub fn recall(&self, class: usize) -> f64 {
        ratio(self.matrix[class][class], self.support(class))
    }

    pub fn f1(&self, class: usize) -> f64 {
        let p = self.precision(class);
        let r = self.recall(class);
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    pub fn class_metrics(&self, class: usize) -> ClassMetrics {
        ClassMetrics {
            precision: self.precision(class),
            recall: self.recall(class),
            f1: self.f1(class),
            support: self.support(class),
        }
    }

    /// Per-class metrics averaged with support as weight
    pub fn weighted_average(&self) -> ClassMetrics {
        let total = self.total();
        if total == 0 {
            return ClassMetrics::default();
        }
        let mut avg = ClassMetrics {
            support: total,
            ..ClassMetrics::default()
        };
        for class in 0..self.n_classes() {
            let m = self.class_metrics(class);
            let w = m.support as f64 / total as f64;
            avg.precision += w * m.precision;
            avg.recall += w * m.recall;
            avg.f1 += w * m.f1;
        }
        avg
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Precision, recall, F1 and support of one class (or their average)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Score used to rank grid-search candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scoring {
    F1Weighted,
    PrecisionWeighted,
}

impl Scoring {
    /// Both metrics, in the order experiments run them
    pub const ALL: [Scoring; 2] = [Scoring::F1Weighted, Scoring::PrecisionWeighted];

    /// Short name used in file names (`f1`, `precision`)
    pub fn name(&self) -> &'static str {
        match self {
            Scoring::F1Weighted => "f1",
            Scoring::PrecisionWeighted => "precision",
        }
    }

    /// Score predictions over the label set `0..n_classes`
    pub fn score(&self, y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Result<f64> {
        let avg = ConfusionMatrix::new(y_true, y_pred, n_classes)?.weighted_average();
        Ok(match self {
            Scoring::F1Weighted => avg.f1,
            Scoring::PrecisionWeighted => avg.precision,
        })
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scoring {
    type Err = SVMError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "f1" | "f1_weighted" => Ok(Scoring::F1Weighted),
            "precision" | "precision_weighted" => Ok(Scoring::PrecisionWeighted),
            other => Err(SVMError::InvalidParameter(format!("Unknown scoring: {other}"))),
        }
    }
}

/// Text table of per-class metrics followed by an `avg / total` line
///
/// `names[i]` labels class `i`.
pub fn classification_report(
    y_true: &[usize],
    y_pred: &[usize],
    names: &[String],
) -> Result<String> {
    const AVG: &str = "avg / total";
    let cm = ConfusionMatrix::new(y_true, y_pred, names.len())?;
    let width = names
        .iter()
        .map(String::len)
        .chain(std::iter::once(AVG.len()))
        .max()
        .unwrap_or(AVG.len());

    let mut report = String::new();
    let _ = writeln!(
        report,
        "{:>width$} {:>9} {:>9} {:>9} {:>9}\n",
        "", "precision", "recall", "f1-score", "support"
    );
    for (class, name) in names.iter().enumerate() {
        let m = cm.class_metrics(class);
        let _ = writeln!(
            report,
            "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
            name, m.precision, m.recall, m.f1, m.support
        );
    }
    let avg = cm.weighted_average();
    let _ = writeln!(
        report,
        "\n{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
        AVG, avg.precision, avg.recall, avg.f1, avg.support
    );
    Ok(report)
}
