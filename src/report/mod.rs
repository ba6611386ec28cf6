//! Experiment report file and plots
//!
//! Everything an experiment prints about settings, grid scores and
//! held-out evaluation goes to `<output>/model.report`.

pub mod plot;

pub use self::plot::*;

use crate::core::Result;
use crate::metrics::Scoring;
use crate::validation::GridSearchResult;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const REPORT_FILE: &str = "model.report";

const RULE: &str = "============================================================";
const THIN_RULE: &str = "------------------------------------------------------------";

/// Sectioned text report
pub struct ReportWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl ReportWriter {
    /// Create (or truncate) `<output_dir>/model.report`
    pub fn create<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        let path = output_dir.as_ref().join(REPORT_FILE);
        let out = BufWriter::new(File::create(&path)?);
        Ok(Self { path, out })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{text}")?;
        Ok(())
    }

    fn heading(&mut self, title: &str) -> Result<()> {
        writeln!(self.out, "{RULE}")?;
        writeln!(self.out, "{title}")?;
        writeln!(self.out, "{RULE}")?;
        Ok(())
    }

    /// Targets, feature dimension and preprocessing settings
    pub fn write_settings(
        &mut self,
        class_counts: &BTreeMap<String, usize>,
        n_features: usize,
        preprocessing: &[String],
        downsample: bool,
    ) -> Result<()> {
        self.heading("Parameters and setting")?;
        writeln!(self.out, "Targets: ")?;
        for (index, (name, count)) in class_counts.iter().enumerate() {
            writeln!(self.out, "    {index}: {name} ({count})")?;
        }
        writeln!(self.out, "Dimensions of feature vector: {n_features}")?;
        writeln!(self.out, "Data preprocessing method:")?;
        for method in preprocessing {
            writeln!(self.out, "    {method}")?;
        }
        writeln!(
            self.out,
            "Downsampling to balance the number of data for each class:"
        )?;
        writeln!(self.out, "    {}", if downsample { "True" } else { "False" })?;
        Ok(())
    }

    pub fn begin_fold(&mut self, fold: usize) -> Result<()> {
        self.heading(&format!("Classification on fold {fold}..."))
    }

    /// Best parameters and every candidate's mean (+/- 2 std)
    pub fn write_grid_search(&mut self, scoring: Scoring, result: &GridSearchResult) -> Result<()> {
        writeln!(self.out, "# Tuning hyper-parameters for {scoring}")?;
        writeln!(self.out, "Best parameters set found on development set:")?;
        writeln!(self.out, "{}", result.best_params)?;
        writeln!(self.out, "{THIN_RULE}")?;
        writeln!(self.out, "Grid scores on development set:")?;
        for score in &result.scores {
            writeln!(
                self.out,
                "{:.3} (+/-{:.3}) for {}",
                score.mean,
                score.std * 2.0,
                score.params
            )?;
        }
        Ok(())
    }

    /// Held-out classification report
    pub fn write_evaluation(&mut self, report: &str, accuracy: f64) -> Result<()> {
        writeln!(self.out, "{THIN_RULE}")?;
        writeln!(self.out, "Detailed classification report:")?;
        writeln!(self.out, "The model is trained on the full development set.")?;
        writeln!(self.out, "The scores are computed on the full evaluation set.")?;
        writeln!(self.out, "{report}")?;
        writeln!(self.out, "Accuracy: {accuracy:.3}")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SVC;
    use crate::validation::{GridSearch, ParameterGrid};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_report_sections() {
        let dir = TempDir::new().unwrap();
        let mut report = ReportWriter::create(dir.path()).unwrap();

        let counts: BTreeMap<String, usize> =
            [("bend".to_string(), 3), ("pull".to_string(), 3)].into_iter().collect();
        report
            .write_settings(&counts, 2, &["StandardScaler".to_string()], false)
            .unwrap();
        report.begin_fold(1).unwrap();

        let x = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.1],
            vec![0.2, 0.0],
            vec![0.0, 0.2],
            vec![3.0, 3.0],
            vec![3.1, 3.1],
            vec![3.2, 3.0],
            vec![3.0, 3.2],
        ];
        let y = vec![0, 0, 0, 0, 1, 1, 1, 1];
        let result = GridSearch::new(SVC::new(), Scoring::F1Weighted)
            .with_grid(ParameterGrid::new(vec![1.0], vec![0.5]))
            .with_cv(2)
            .fit(&x, &y)
            .unwrap();
        report.write_grid_search(Scoring::F1Weighted, &result).unwrap();
        report.write_evaluation("report body", 1.0).unwrap();
        report.flush().unwrap();

        let text = fs::read_to_string(dir.path().join(REPORT_FILE)).unwrap();
        assert!(text.contains("Parameters and setting"));
        assert!(text.contains("    0: bend (3)"));
        assert!(text.contains("Dimensions of feature vector: 2"));
        assert!(text.contains("    False"));
        assert!(text.contains("Classification on fold 1..."));
        assert!(text.contains("# Tuning hyper-parameters for f1"));
        assert!(text.contains("1.000 (+/-0.000) for {'kernel': 'rbf', 'C': 1, 'gamma': 0.5}"));
        assert!(text.contains("report body"));
    }
}
