//! Optimal-transport distance between a generator and the target mixture.
//!
//! The distance is the transport cost of the entropic (Sinkhorn) coupling
//! between two equally weighted point clouds under the Euclidean ground
//! cost. Potentials are updated in the log domain so small regularization
//! strengths do not underflow.

use rand::Rng;

use crate::error::TransportError;
use crate::math::Matrix;
use crate::mixture::MixtureOfGaussians;
use crate::models::Generator;
use crate::rng::normal_matrix;

/// Stop once the row marginals are matched to this L1 error.
const MARGINAL_TOLERANCE: f64 = 1e-9;

/// Entropic OT cost between the rows of `x` and the rows of `y`, each cloud
/// carrying uniform mass.
pub fn sinkhorn_cost(x: &Matrix, y: &Matrix, epsilon: f64, max_iter: usize) -> Result<f64, TransportError> {
    if x.rows == 0 || y.rows == 0 {
        return Err(TransportError::Empty);
    }
    if x.cols != y.cols {
        return Err(TransportError::DimensionMismatch(x.cols, y.cols));
    }
    let (n, m) = (x.rows, y.rows);
    let cost = euclidean_costs(x, y);
    let log_a = -(n as f64).ln();
    let log_b = -(m as f64).ln();

    let mut f = vec![0.0f64; n];
    let mut g = vec![0.0f64; m];
    let mut scratch = vec![0.0f64; n.max(m)];

    for _ in 0..max_iter {
        for i in 0..n {
            let row = &cost[i * m..(i + 1) * m];
            for j in 0..m {
                scratch[j] = (g[j] - row[j]) / epsilon;
            }
            f[i] = epsilon * (log_a - log_sum_exp(&scratch[..m]));
        }
        for j in 0..m {
            for i in 0..n {
                scratch[i] = (f[i] - cost[i * m + j]) / epsilon;
            }
            g[j] = epsilon * (log_b - log_sum_exp(&scratch[..n]));
        }

        // columns are exact after the g update, so only rows can be off
        let mut err = 0.0;
        for i in 0..n {
            let row = &cost[i * m..(i + 1) * m];
            let mass: f64 = (0..m).map(|j| ((f[i] + g[j] - row[j]) / epsilon).exp()).sum();
            err += (mass - log_a.exp()).abs();
        }
        if err < MARGINAL_TOLERANCE {
            break;
        }
    }

    let mut total = 0.0;
    for i in 0..n {
        let row = &cost[i * m..(i + 1) * m];
        for j in 0..m {
            total += ((f[i] + g[j] - row[j]) / epsilon).exp() * row[j];
        }
    }
    if !total.is_finite() {
        return Err(TransportError::NonFinite);
    }
    Ok(total.max(0.0))
}

fn euclidean_costs(x: &Matrix, y: &Matrix) -> Vec<f64> {
    let mut cost = Vec::with_capacity(x.rows * y.rows);
    for i in 0..x.rows {
        let xi = x.row(i);
        for j in 0..y.rows {
            let sq: f64 = xi
                .iter()
                .zip(y.row(j))
                .map(|(&a, &b)| {
                    let d = a as f64 - b as f64;
                    d * d
                })
                .sum();
            cost.push(sq.sqrt());
        }
    }
    cost
}

fn log_sum_exp(v: &[f64]) -> f64 {
    let max = v.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + v.iter().map(|x| (x - max).exp()).sum::<f64>().ln()
}

/// The fixed arguments of a distance evaluation, bundled once per run.
#[derive(Clone, Debug)]
pub struct OtEstimator {
    pub z_dim: usize,
    pub eval_samples: usize,
    pub epsilon: f64,
    pub max_iter: usize,
}

impl OtEstimator {
    pub fn new(z_dim: usize, eval_samples: usize, epsilon: f64, max_iter: usize) -> Self {
        Self {
            z_dim,
            eval_samples,
            epsilon,
            max_iter,
        }
    }

    /// Distance between `eval_samples` generated points and as many target
    /// draws. The noise is drawn first, then the target sample, both from
    /// `rng`. The generator is only read.
    pub fn estimate<G, R>(&self, generator: &G, target: &MixtureOfGaussians, rng: &mut R) -> Result<f64, TransportError>
    where
        G: Generator + ?Sized,
        R: Rng + ?Sized,
    {
        let z = normal_matrix(self.eval_samples, self.z_dim, rng);
        let generated = generator.forward(&z);
        let real = target.sample(self.eval_samples, rng);
        sinkhorn_cost(&generated, &real, self.epsilon, self.max_iter)
    }
}
