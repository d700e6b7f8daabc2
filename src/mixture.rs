use rand::Rng;
use rand_distr::{Distribution, StandardNormal, WeightedIndex};
use std::f64::consts::PI;

use crate::error::MixtureError;
use crate::math::Matrix;

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Mixture of isotropic Gaussians whose means sit evenly spaced on a ring in
/// the first two coordinates of the target space.
#[derive(Clone, Debug)]
pub struct MixtureOfGaussians {
    weights: Vec<f64>,
    means: Vec<Vec<f64>>,
    std: f64,
    dim: usize,
    picker: WeightedIndex<f64>,
}

impl MixtureOfGaussians {
    pub fn new(weights: Vec<f64>, radius: f64, std: f64, dim: usize) -> Result<Self, MixtureError> {
        if weights.is_empty() {
            return Err(MixtureError::Empty);
        }
        if dim < 2 {
            return Err(MixtureError::Dimension(dim));
        }
        if let Some((index, &value)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(MixtureError::NegativeWeight { index, value });
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(MixtureError::NotNormalized { sum });
        }
        let picker = WeightedIndex::new(&weights).map_err(|_| MixtureError::NotNormalized { sum })?;

        let k = weights.len();
        let means = (0..k)
            .map(|i| {
                let angle = 2.0 * PI * i as f64 / k as f64;
                let mut mean = vec![0.0; dim];
                mean[0] = radius * angle.cos();
                mean[1] = radius * angle.sin();
                mean
            })
            .collect();

        Ok(Self {
            weights,
            means,
            std,
            dim,
            picker,
        })
    }

    /// `k` uniform draws from `[0, 1)` normalized to sum to one.
    pub fn random_weights<R: Rng + ?Sized>(k: usize, rng: &mut R) -> Vec<f64> {
        let raw: Vec<f64> = (0..k).map(|_| rng.gen::<f64>()).collect();
        let sum: f64 = raw.iter().sum();
        raw.into_iter().map(|w| w / sum).collect()
    }

    /// Draw `n` i.i.d. points as an `n x dim` matrix.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Matrix {
        let mut out = Matrix::zeros(n, self.dim);
        for r in 0..n {
            let mean = &self.means[self.picker.sample(rng)];
            for (c, &mu) in mean.iter().enumerate() {
                let e: f64 = StandardNormal.sample(rng);
                out.set(r, c, (mu + self.std * e) as f32);
            }
        }
        out
    }

    /// Log of the mixture density at `x`.
    pub fn log_density(&self, x: &[f64]) -> Result<f64, MixtureError> {
        if x.len() != self.dim {
            return Err(MixtureError::PointDimension {
                expected: self.dim,
                got: x.len(),
            });
        }
        let var = self.std * self.std;
        let log_norm = -0.5 * self.dim as f64 * (2.0 * PI * var).ln();
        let terms: Vec<f64> = self
            .weights
            .iter()
            .zip(self.means.iter())
            .filter(|(w, _)| **w > 0.0)
            .map(|(w, mean)| {
                let sq: f64 = x.iter().zip(mean.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
                w.ln() + log_norm - sq / (2.0 * var)
            })
            .collect();
        let max = terms.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        Ok(max + terms.iter().map(|t| (t - max).exp()).sum::<f64>().ln())
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn means(&self) -> &[Vec<f64>] {
        &self.means
    }

    pub fn n_components(&self) -> usize {
        self.weights.len()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn std(&self) -> f64 {
        self.std
    }
}
