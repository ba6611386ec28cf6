//! Probability estimates for pairwise machines
//!
//! Each binary machine gets a Platt sigmoid `P(+1 | f) = 1 / (1 + exp(A·f + B))`
//! fitted on its decision values; the pairwise probabilities are then coupled
//! into one distribution over all classes (Wu, Lin & Weng, 2004, method 2).

use serde::{Deserialize, Serialize};

/// Lower/upper clamp applied to pairwise probabilities before coupling
const MIN_PAIRWISE_PROB: f64 = 1e-7;

/// Fitted sigmoid parameters of one binary machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattScaling {
    pub a: f64,
    pub b: f64,
}

impl PlattScaling {
    /// Fit A and B by Newton's method with backtracking line search.
    ///
    /// `positive[i]` tells whether sample i belongs to the +1 side.
    pub fn fit(decision_values: &[f64], positive: &[bool]) -> Self {
        const MAX_ITER: usize = 100;
        const MIN_STEP: f64 = 1e-10;
        const SIGMA: f64 = 1e-12;
        const EPS: f64 = 1e-5;

        let prior1 = positive.iter().filter(|&&p| p).count() as f64;
        let prior0 = positive.len() as f64 - prior1;

        // Regularized targets instead of hard 0/1
        let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
        let lo_target = 1.0 / (prior0 + 2.0);
        let targets: Vec<f64> = positive
            .iter()
            .map(|&p| if p { hi_target } else { lo_target })
            .collect();

        let objective = |a: f64, b: f64| -> f64 {
            decision_values
                .iter()
                .zip(targets.iter())
                .map(|(&f, &t)| {
                    let f_apb = f * a + b;
                    if f_apb >= 0.0 {
                        t * f_apb + (-f_apb).exp().ln_1p()
                    } else {
                        (t - 1.0) * f_apb + f_apb.exp().ln_1p()
                    }
                })
                .sum()
        };

        let mut a = 0.0;
        let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
        let mut fval = objective(a, b);

        for _ in 0..MAX_ITER {
            let (mut h11, mut h22, mut h21) = (SIGMA, SIGMA, 0.0);
            let (mut g1, mut g2) = (0.0, 0.0);

            for (&f, &t) in decision_values.iter().zip(targets.iter()) {
                let f_apb = f * a + b;
                let (p, q) = if f_apb >= 0.0 {
                    let e = (-f_apb).exp();
                    (e / (1.0 + e), 1.0 / (1.0 + e))
                } else {
                    let e = f_apb.exp();
                    (1.0 / (1.0 + e), e / (1.0 + e))
                };
                let d2 = p * q;
                h11 += f * f * d2;
                h22 += d2;
                h21 += f * d2;
                let d1 = t - p;
                g1 += f * d1;
                g2 += d1;
            }

            if g1.abs() < EPS && g2.abs() < EPS {
                break;
            }

            let det = h11 * h22 - h21 * h21;
            let d_a = -(h22 * g1 - h21 * g2) / det;
            let d_b = -(-h21 * g1 + h11 * g2) / det;
            let gd = g1 * d_a + g2 * d_b;

            let mut step = 1.0;
            while step >= MIN_STEP {
                let new_a = a + step * d_a;
                let new_b = b + step * d_b;
                let new_f = objective(new_a, new_b);
                if new_f < fval + 0.0001 * step * gd {
                    a = new_a;
                    b = new_b;
                    fval = new_f;
                    break;
                }
                step /= 2.0;
            }

            if step < MIN_STEP {
                log::debug!("Platt scaling line search failed");
                break;
            }
        }

        Self { a, b }
    }

    /// Probability that a decision value belongs to the +1 side
    pub fn predict(&self, decision_value: f64) -> f64 {
        let f_apb = decision_value * self.a + self.b;
        if f_apb >= 0.0 {
            let e = (-f_apb).exp();
            e / (1.0 + e)
        } else {
            1.0 / (1.0 + f_apb.exp())
        }
    }

    /// Pairwise probability clamped away from 0 and 1
    pub fn predict_clamped(&self, decision_value: f64) -> f64 {
        self.predict(decision_value)
            .clamp(MIN_PAIRWISE_PROB, 1.0 - MIN_PAIRWISE_PROB)
    }
}

/// Couple pairwise probabilities `r[i][j] = P(class i | class i or j)` into
/// a probability vector over `k` classes.
pub fn couple_pairwise(r: &[Vec<f64>]) -> Vec<f64> {
    let k = r.len();
    if k == 0 {
        return Vec::new();
    }
    if k == 1 {
        return vec![1.0];
    }

    let max_iter = 100.max(k);
    let eps = 0.005 / k as f64;
    let mut p = vec![1.0 / k as f64; k];
    let mut q = vec![vec![0.0; k]; k];
    let mut qp = vec![0.0; k];

    for t in 0..k {
        for j in 0..k {
            if j == t {
                continue;
            }
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = -r[j][t] * r[t][j];
        }
    }

    for _ in 0..max_iter {
        let mut p_q_p = 0.0;
        for t in 0..k {
            qp[t] = (0..k).map(|j| q[t][j] * p[j]).sum();
            p_q_p += p[t] * qp[t];
        }

        let max_error = qp
            .iter()
            .map(|&v| (v - p_q_p).abs())
            .fold(0.0, f64::max);
        if max_error < eps {
            break;
        }

        for t in 0..k {
            let diff = (-qp[t] + p_q_p) / q[t][t];
            p[t] += diff;
            p_q_p = (p_q_p + diff * (diff * q[t][t] + 2.0 * qp[t])) / (1.0 + diff) / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
    }

    p
}
