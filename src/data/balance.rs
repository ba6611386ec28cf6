//! Balanced per-class subsampling

use crate::core::{Result, SVMError};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

/// Keep the same number of rows from every class
///
/// Every class keeps as many rows as the smallest class has, or
/// `floor(min_count * subsample_size)` rows when `subsample_size < 1`.
/// Classes larger than that are shuffled before truncation. The output is
/// grouped by class in ascending label order.
pub fn balanced_subsample<R: Rng + ?Sized>(
    x: &[Vec<f64>],
    y: &[usize],
    subsample_size: f64,
    rng: &mut R,
) -> Result<(Vec<Vec<f64>>, Vec<usize>)> {
    if x.len() != y.len() {
        return Err(SVMError::InvalidDataset(format!(
            "{} rows but {} labels",
            x.len(),
            y.len()
        )));
    }
    if !(subsample_size > 0.0) {
        return Err(SVMError::InvalidParameter(format!(
            "subsample_size must be positive, got: {subsample_size}"
        )));
    }

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    let min_count = match by_class.values().map(Vec::len).min() {
        Some(n) => n,
        None => return Ok((Vec::new(), Vec::new())),
    };
    let keep = if subsample_size < 1.0 {
        (min_count as f64 * subsample_size) as usize
    } else {
        min_count
    };

    let mut xs = Vec::with_capacity(keep * by_class.len());
    let mut ys = Vec::with_capacity(keep * by_class.len());
    for (label, mut indices) in by_class {
        if indices.len() > keep {
            indices.shuffle(rng);
        }
        for &i in indices.iter().take(keep) {
            xs.push(x[i].clone());
            ys.push(label);
        }
    }

    Ok((xs, ys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn data() -> (Vec<Vec<f64>>, Vec<usize>) {
        let y = vec![1, 0, 1, 1, 2, 1, 2, 0, 2];
        let x = (0..y.len()).map(|i| vec![i as f64]).collect();
        (x, y)
    }

    #[test]
    fn test_balanced_counts_and_order() {
        let (x, y) = data();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let (xs, ys) = balanced_subsample(&x, &y, 1.0, &mut rng).unwrap();

        assert_eq!(ys, vec![0, 0, 1, 1, 2, 2]);
        // The smallest class is kept whole and in order
        assert_eq!(xs[0], vec![1.0]);
        assert_eq!(xs[1], vec![7.0]);
        // Rows stay attached to their labels
        for (row, &label) in xs.iter().zip(ys.iter()) {
            assert_eq!(y[row[0] as usize], label);
        }
    }

    #[test]
    fn test_fractional_subsample() {
        let y = vec![0, 0, 0, 0, 1, 1, 1, 1, 1];
        let x: Vec<Vec<f64>> = (0..y.len()).map(|i| vec![i as f64]).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (xs, ys) = balanced_subsample(&x, &y, 0.5, &mut rng).unwrap();
        assert_eq!(ys, vec![0, 0, 1, 1]);
        assert_eq!(xs.len(), 4);
    }

    #[test]
    fn test_reproducible_with_seed() {
        let (x, y) = data();
        let a = balanced_subsample(&x, &y, 1.0, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        let b = balanced_subsample(&x, &y, 1.0, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_subsample_size() {
        let (x, y) = data();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(balanced_subsample(&x, &y, 0.0, &mut rng).is_err());
        assert!(balanced_subsample(&x, &y[1..], 1.0, &mut rng).is_err());
    }
}
