//! Numeric, random and JSON file helpers shared across the crate

use crate::core::{Result, SVMError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Column statistics over dense feature matrices
pub mod stats {
    use std::cmp::Ordering;

    /// Extract column `j` of a row-major matrix
    pub fn column(rows: &[Vec<f64>], j: usize) -> Vec<f64> {
        rows.iter().map(|row| row[j]).collect()
    }

    /// Finite values of column `j`, sorted ascending
    pub fn sorted_finite_column(rows: &[Vec<f64>], j: usize) -> Vec<f64> {
        let mut values: Vec<f64> = rows
            .iter()
            .map(|row| row[j])
            .filter(|v| v.is_finite())
            .collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        values
    }

    /// Percentile of sorted data with linear interpolation between ranks
    ///
    /// Returns `None` for empty input.
    pub fn percentile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
        if sorted.is_empty() {
            return None;
        }
        let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        let frac = rank - lo as f64;
        Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
    }

    /// Median of sorted data
    pub fn median_sorted(sorted: &[f64]) -> Option<f64> {
        percentile_sorted(sorted, 50.0)
    }

    pub fn mean(values: &[f64]) -> f64 {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    }

    /// Population standard deviation (divides by n)
    pub fn std_dev(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let m = mean(values);
        (values.iter().map(|&v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
    }

    /// Mean weighted by non-negative weights
    pub fn weighted_mean(values: &[f64], weights: &[f64]) -> f64 {
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return mean(values);
        }
        values
            .iter()
            .zip(weights.iter())
            .map(|(v, w)| v * w)
            .sum::<f64>()
            / total
    }
}

/// `num` values evenly spaced on a base-2 log scale from 2^start to 2^stop
pub fn logspace2(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![2f64.powf(start)],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num)
                .map(|i| 2f64.powf(start + step * i as f64))
                .collect()
        }
    }
}

/// `prefix` with `suffix` appended to its last component
///
/// `with_suffix("out/bend_3.iter1", ".PCA.json")` gives `out/bend_3.iter1.PCA.json`.
pub fn with_suffix<P: AsRef<Path>>(prefix: P, suffix: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_ref().as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Reproducible RNG when a seed is given, entropy-seeded otherwise
pub fn seeded_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Write a value as pretty-printed JSON
pub fn write_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Read a JSON file, mapping a missing file to [`SVMError::MissingFile`]
pub fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SVMError::MissingFile(path.to_path_buf()));
    }
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::stats::*;
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_percentile_interpolates() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(median_sorted(&sorted), Some(2.5));
        assert_eq!(percentile_sorted(&sorted, 25.0), Some(1.75));
        assert_eq!(percentile_sorted(&sorted, 100.0), Some(4.0));
        assert_eq!(percentile_sorted(&[], 50.0), None);
    }

    #[test]
    fn test_sorted_finite_column_drops_nan_and_inf() {
        let rows = vec![
            vec![3.0, 0.0],
            vec![f64::NAN, 0.0],
            vec![1.0, 0.0],
            vec![f64::INFINITY, 0.0],
        ];
        assert_eq!(sorted_finite_column(&rows, 0), vec![1.0, 3.0]);
        assert_eq!(column(&rows, 1), vec![0.0; 4]);
    }

    #[test]
    fn test_mean_and_std() {
        let values = vec![1.0, 3.0, 5.0];
        assert_eq!(mean(&values), 3.0);
        assert_abs_diff_eq!(std_dev(&values), (8.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_eq!(weighted_mean(&[1.0, 4.0], &[3.0, 1.0]), 1.75);
    }

    #[test]
    fn test_logspace2_matches_grid() {
        let c_range = logspace2(-5.0, 5.0, 11);
        assert_eq!(c_range.len(), 11);
        assert_abs_diff_eq!(c_range[0], 0.03125, epsilon = 1e-15);
        assert_abs_diff_eq!(c_range[5], 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(c_range[10], 32.0, epsilon = 1e-12);

        let g_range = logspace2(-10.0, -2.0, 9);
        assert_abs_diff_eq!(g_range[8], 0.25, epsilon = 1e-15);
        assert_eq!(logspace2(1.0, 3.0, 1), vec![2.0]);
    }

    #[test]
    fn test_json_helpers() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("values.json");
        write_json(&vec![1.5, 2.5], &path).unwrap();
        let back: Vec<f64> = read_json(&path).unwrap();
        assert_eq!(back, vec![1.5, 2.5]);

        let missing: Result<Vec<f64>> = read_json(dir.path().join("nope.json"));
        assert!(matches!(missing, Err(SVMError::MissingFile(_))));
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(
            with_suffix("out/bend_3.iter1", ".PCA.json"),
            PathBuf::from("out/bend_3.iter1.PCA.json")
        );
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        use rand::Rng;
        let a: u64 = seeded_rng(Some(9)).gen();
        let b: u64 = seeded_rng(Some(9)).gen();
        assert_eq!(a, b);
    }
}
