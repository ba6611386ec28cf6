//! Stratified k-fold partitioning
//!
//! Each class is dealt into folds separately so that every fold keeps
//! roughly the class proportions of the whole set.

use crate::core::{Result, SVMError};
use crate::utils::{read_json, write_json};
use log::{info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Train/test index split of one fold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Stratified k-fold splitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StratifiedKFold {
    pub n_folds: usize,
    pub shuffle: bool,
}

impl StratifiedKFold {
    pub fn new(n_folds: usize, shuffle: bool) -> Self {
        Self { n_folds, shuffle }
    }

    /// Split without randomness; `shuffle` is ignored
    pub fn split(&self, y: &[usize]) -> Result<Vec<Fold>> {
        self.assign::<rand_chacha::ChaCha8Rng>(y, None)
    }

    /// Split, shuffling each class first when `shuffle` is set
    pub fn split_with_rng<R: Rng + ?Sized>(&self, y: &[usize], rng: &mut R) -> Result<Vec<Fold>> {
        self.assign(y, Some(rng))
    }

    fn assign<R: Rng + ?Sized>(&self, y: &[usize], mut rng: Option<&mut R>) -> Result<Vec<Fold>> {
        let k = self.n_folds;
        if k < 2 {
            return Err(SVMError::InvalidParameter(format!(
                "n_folds must be at least 2, got: {k}"
            )));
        }
        if k > y.len() {
            return Err(SVMError::InvalidParameter(format!(
                "Cannot have n_folds={k} greater than the number of samples: {}",
                y.len()
            )));
        }

        let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, &label) in y.iter().enumerate() {
            by_class.entry(label).or_default().push(i);
        }
        if let Some(min) = by_class.values().map(Vec::len).min() {
            if min < k {
                warn!("The least populated class in y has only {min} members, which is too few. The minimum number of labels for any class cannot be less than n_folds={k}.");
            }
        }

        let mut test_fold = vec![0usize; y.len()];
        for members in by_class.values() {
            // Positions beyond the class size are dropped after dealing
            let n = members.len().max(k);
            let mut positions: Vec<usize> = (0..n).collect();
            if self.shuffle {
                if let Some(rng) = rng.as_deref_mut() {
                    positions.shuffle(rng);
                }
            }

            let mut start = 0;
            for fold in 0..k {
                let size = n / k + usize::from(fold < n % k);
                for &pos in &positions[start..start + size] {
                    if pos < members.len() {
                        test_fold[members[pos]] = fold;
                    }
                }
                start += size;
            }
        }

        Ok((0..k)
            .map(|fold| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..y.len()).partition(|&i| test_fold[i] == fold);
                Fold { train, test }
            })
            .collect())
    }
}

/// Fold partition as written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvFolds {
    pub n_samples: usize,
    pub folds: Vec<Fold>,
}

/// `<dir>/<tag>.iter<i>.fold<k>.CVFold.json`
pub fn fold_file_path<P: AsRef<Path>>(dir: P, tag: &str, iteration: usize, n_folds: usize) -> PathBuf {
    dir.as_ref()
        .join(format!("{tag}.iter{iteration}.fold{n_folds}.CVFold.json"))
}

/// Reuse the partition stored at `path` or create and store a new one
pub fn load_or_create_folds<R: Rng + ?Sized, P: AsRef<Path>>(
    path: P,
    y: &[usize],
    n_folds: usize,
    rng: &mut R,
) -> Result<Vec<Fold>> {
    let path = path.as_ref();
    if path.exists() {
        info!("Load pre-partitioned cross validation folds...");
        let stored: CvFolds = read_json(path)?;
        if stored.n_samples != y.len() || stored.folds.len() != n_folds {
            return Err(SVMError::InvalidDataset(format!(
                "{} holds {} folds over {} samples, expected {} folds over {}",
                path.display(),
                stored.folds.len(),
                stored.n_samples,
                n_folds,
                y.len()
            )));
        }
        return Ok(stored.folds);
    }

    info!("Shuffling the samples and dividing them into {n_folds} folds...");
    let folds = StratifiedKFold::new(n_folds, true).split_with_rng(y, rng)?;
    write_json(
        &CvFolds {
            n_samples: y.len(),
            folds: folds.clone(),
        },
        path,
    )?;
    Ok(folds)
}
