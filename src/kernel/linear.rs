//! Linear kernel implementation

use crate::core::SparseVector;
use crate::kernel::Kernel;

/// Linear kernel: K(x, y) = x^T * y
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearKernel;

impl LinearKernel {
    pub fn new() -> Self {
        Self
    }
}

impl Kernel for LinearKernel {
    fn compute(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        dot_product_sparse(x, y)
    }
}

/// Dot product of two sparse vectors with sorted indices, merge style.
fn dot_product_sparse(x: &SparseVector, y: &SparseVector) -> f64 {
    let mut result = 0.0;
    let (mut i, mut j) = (0, 0);

    while i < x.indices.len() && j < y.indices.len() {
        match x.indices[i].cmp(&y.indices[j]) {
            std::cmp::Ordering::Equal => {
                result += x.values[i] * y.values[j];
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_kernel_dense_rows() {
        let kernel = LinearKernel::new();
        let x = SparseVector::from_dense(&[1.0, 2.0, 3.0]);
        let y = SparseVector::from_dense(&[0.5, 0.0, -1.0]);

        assert_eq!(kernel.compute(&x, &y), -2.5);
        assert_eq!(kernel.compute(&x, &x), 14.0);
    }

    #[test]
    fn test_dot_product_partial_overlap() {
        let x = SparseVector::new(vec![0, 2, 5], vec![1.0, 3.0, 2.0]).unwrap();
        let y = SparseVector::new(vec![2, 3, 5], vec![2.0, 1.0, 4.0]).unwrap();

        // Overlap at 2 and 5
        assert_eq!(dot_product_sparse(&x, &y), 14.0);
    }

    #[test]
    fn test_dot_product_empty() {
        let x = SparseVector::empty();
        let y = SparseVector::new(vec![0, 1], vec![1.0, 2.0]).unwrap();

        assert_eq!(dot_product_sparse(&x, &y), 0.0);
        assert_eq!(dot_product_sparse(&y, &x), 0.0);
    }
}
