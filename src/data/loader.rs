//! Feature text files and the labelled feature matrix
//!
//! Format: one instance per line, whitespace-separated numbers. `nan`,
//! `inf` and `-inf` are accepted; lines starting with `#` and blank lines
//! are skipped.
//!
//! Example:
//! 0.51 1.2e-3 nan 7.0
//! 0.48 9.0e-4 2.1 inf

use crate::core::{Result, SVMError};
use crate::data::balance::balanced_subsample;
use log::{debug, info};
use rand::Rng;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Read every instance of one feature file
pub fn read_feature_file<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<f64>>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SVMError::MissingFile(path.to_path_buf()),
        _ => SVMError::IoError(e),
    })?;
    parse_features(BufReader::new(file)).map_err(|e| match e {
        SVMError::ParseError(msg) => SVMError::ParseError(format!("{}: {msg}", path.display())),
        other => other,
    })
}

/// Parse feature rows from a reader
pub fn parse_features<R: BufRead>(reader: R) -> Result<Vec<Vec<f64>>> {
    let mut rows: Vec<Vec<f64>> = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let row = line
            .split_whitespace()
            .map(|token| {
                token.parse::<f64>().map_err(|_| {
                    SVMError::ParseError(format!(
                        "Invalid value '{}' on line {}",
                        token,
                        line_num + 1
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(SVMError::DimensionMismatch {
                    expected: first.len(),
                    actual: row.len(),
                });
            }
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Labelled feature matrix assembled from technique files
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// Instances, grouped by class
    pub x: Vec<Vec<f64>>,
    /// Class index of each instance
    pub y: Vec<usize>,
    pub n_features: usize,
    /// Number of instances per technique
    pub class_counts: BTreeMap<String, usize>,
    /// Class index of every technique (position in sorted order)
    pub technique_index: BTreeMap<String, usize>,
    /// `bend_120_hamm_80_...`, used as prefix for output files
    pub tag: String,
}

impl FeatureSet {
    /// Build a feature set from rows and class indices
    pub fn new(x: Vec<Vec<f64>>, y: Vec<usize>, techniques: &[String]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(SVMError::InvalidDataset(format!(
                "{} rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        let n_features = x.first().map(Vec::len).ok_or(SVMError::EmptyDataset)?;

        let mut sorted: Vec<String> = techniques.to_vec();
        sorted.sort();
        sorted.dedup();
        let technique_index: BTreeMap<String, usize> = sorted
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        if let Some(&bad) = y.iter().find(|&&label| label >= sorted.len()) {
            return Err(SVMError::InvalidLabel(bad as f64));
        }

        let class_counts = sorted
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), y.iter().filter(|&&label| label == i).count()))
            .collect();

        let mut set = Self {
            x,
            y,
            n_features,
            class_counts,
            technique_index,
            tag: String::new(),
        };
        set.tag = set.make_tag();
        Ok(set)
    }

    fn make_tag(&self) -> String {
        self.class_counts
            .iter()
            .map(|(name, count)| format!("{name}_{count}"))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Technique names ordered by class index
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<(usize, String)> = self
            .technique_index
            .iter()
            .map(|(name, &i)| (i, name.clone()))
            .collect();
        names.sort();
        names.into_iter().map(|(_, name)| name).collect()
    }

    pub fn n_classes(&self) -> usize {
        self.technique_index.len()
    }

    /// Rows and labels at the given indices
    pub fn subset(&self, indices: &[usize]) -> (Vec<Vec<f64>>, Vec<usize>) {
        indices
            .iter()
            .map(|&i| (self.x[i].clone(), self.y[i]))
            .unzip()
    }

    /// Balance the classes, recomputing counts and tag
    pub fn downsample<R: Rng + ?Sized>(self, rng: &mut R) -> Result<Self> {
        let (x, y) = balanced_subsample(&self.x, &self.y, 1.0, rng)?;
        let techniques = self.class_names();
        let set = Self::new(x, y, &techniques)?;
        info!("Downsampled to {} instances ({})", set.x.len(), set.tag);
        Ok(set)
    }
}

/// Load every technique's files into one labelled matrix
///
/// The feature dimension comes from the first file found; every other file
/// must match it.
pub fn load_features<R: Rng + ?Sized>(
    files: &BTreeMap<String, Vec<PathBuf>>,
    downsample: bool,
    rng: &mut R,
) -> Result<FeatureSet> {
    let techniques: Vec<String> = files.keys().cloned().collect();
    let mut x: Vec<Vec<f64>> = Vec::new();
    let mut y = Vec::new();
    let mut n_features: Option<usize> = None;

    for (class_index, technique) in techniques.iter().enumerate() {
        let mut count = 0;
        for path in &files[technique] {
            let rows = read_feature_file(path)?;
            if let Some(row) = rows.first() {
                let expected = *n_features.get_or_insert(row.len());
                if row.len() != expected {
                    return Err(SVMError::DimensionMismatch {
                        expected,
                        actual: row.len(),
                    });
                }
            }
            count += rows.len();
            x.extend(rows);
        }
        y.extend(std::iter::repeat(class_index).take(count));
        debug!("Loaded {count} instances of '{technique}'");
    }

    if x.is_empty() {
        return Err(SVMError::EmptyDataset);
    }

    let set = FeatureSet::new(x, y, &techniques)?;
    info!(
        "Loaded {} instances with {} features ({})",
        set.x.len(),
        set.n_features,
        set.tag
    );

    if downsample {
        set.downsample(rng)
    } else {
        Ok(set)
    }
}
