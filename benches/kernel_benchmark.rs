//! Benchmarks for kernel evaluation and classifier training.
//!
//! Run:
//! - cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gtsvm::api::{ClassWeight, SVC};
use gtsvm::kernel::{Kernel, LinearKernel, RBFKernel};
use gtsvm::SparseVector;

const DIMS: [usize; 3] = [16, 64, 256];
const SAMPLES: [usize; 3] = [30, 90, 180];

fn dense_row(dim: usize, phase: f64) -> Vec<f64> {
    (0..dim).map(|i| (phase + i as f64 * 0.37).sin()).collect()
}

/// Three clusters of `n / 3` rows each
fn clustered(n: usize, dim: usize) -> (Vec<Vec<f64>>, Vec<usize>) {
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for i in 0..n {
        let class = i % 3;
        let mut row = dense_row(dim, i as f64 * 0.11);
        for v in row.iter_mut() {
            *v = 0.3 * *v + class as f64 * 2.0;
        }
        x.push(row);
        y.push(class);
    }
    (x, y)
}

fn bench_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel_compute");
    for dim in DIMS {
        let a = SparseVector::from_dense(&dense_row(dim, 0.0));
        let b = SparseVector::from_dense(&dense_row(dim, 1.0));

        let linear = LinearKernel::new();
        group.bench_with_input(BenchmarkId::new("linear", dim), &dim, |bench, _| {
            bench.iter(|| linear.compute(black_box(&a), black_box(&b)))
        });

        let rbf = RBFKernel::with_auto_gamma(dim).expect("dimension is positive");
        group.bench_with_input(BenchmarkId::new("rbf", dim), &dim, |bench, _| {
            bench.iter(|| rbf.compute(black_box(&a), black_box(&b)))
        });
    }
    group.finish();
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("svc_fit");
    group.sample_size(10);
    for n in SAMPLES {
        let (x, y) = clustered(n, 16);
        for probability in [false, true] {
            let svc = SVC::new()
                .with_c(4.0)
                .with_class_weight(ClassWeight::Balanced)
                .with_probability(probability);
            let name = if probability { "rbf_proba" } else { "rbf" };
            group.bench_with_input(BenchmarkId::new(name, n), &n, |bench, _| {
                bench.iter(|| svc.fit(black_box(&x), black_box(&y)))
            });
        }
    }
    group.finish();
}

criterion_group!(kernel_benchmark, bench_kernels, bench_fit);
criterion_main!(kernel_benchmark);
