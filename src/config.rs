use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Training configuration, loadable from a TOML or JSON file.
///
/// Missing fields take the values of [`Config::default`]. A configuration is
/// never mutated once training starts; derived values such as the output
/// path are computed from it on demand.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Number of outer training steps.
    pub n_steps: usize,
    /// Samples per real and per fake batch.
    pub batch_size: usize,
    /// Width of the hidden layer of both networks.
    pub latent_dim: usize,
    /// Index of the accelerator to use when one is available.
    pub gpu: usize,
    /// Dimensionality of the generator's input noise.
    pub z_dim: usize,
    /// Dimensionality of the target space.
    pub data_dim: usize,
    pub d_lr: f32,
    pub g_lr: f32,
    pub b1: f32,
    pub b2: f32,
    /// Discriminator updates per outer step. Zero disables the phase.
    pub d_steps: usize,
    /// Weight of the log-confidence gap penalty.
    pub lam: f32,
    pub seed: u64,
    pub n_gaussians: usize,
    pub ring_radius: f64,
    pub component_std: f64,
    /// Sample size used by the distance estimator.
    pub eval_samples: usize,
    pub sinkhorn_epsilon: f64,
    pub sinkhorn_iterations: usize,
    /// Clamp discriminator scores into `[eps, 1 - eps]` before taking
    /// logarithms. `None` leaves them unguarded: any score of exactly 0 or 1
    /// aborts the run. That includes a confident real score of 1.0, which an
    /// f32 sigmoid returns for logits above roughly 16.6.
    pub score_clamp: Option<f32>,
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            n_steps: 2701,
            batch_size: 512,
            latent_dim: 128,
            gpu: 0,
            z_dim: 256,
            data_dim: 2,
            d_lr: 1e-4,
            g_lr: 1e-3,
            b1: 0.5,
            b2: 0.999,
            d_steps: 5,
            lam: 0.3,
            seed: 0,
            n_gaussians: 8,
            ring_radius: 2.0,
            component_std: 0.02,
            eval_samples: 1000,
            sinkhorn_epsilon: 0.05,
            sinkhorn_iterations: 100,
            score_clamp: None,
            output_dir: PathBuf::from("images"),
        }
    }
}

impl Config {
    /// Load configuration from the given path. Supports TOML or JSON based on
    /// the file extension. The result is validated.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_err = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };
        let cfg: Config = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?
        } else {
            toml::from_str(&content).map_err(|e| parse_err(e.to_string()))?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check every invariant; called by all constructors that consume a config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("n_steps", self.n_steps),
            ("batch_size", self.batch_size),
            ("latent_dim", self.latent_dim),
            ("z_dim", self.z_dim),
            ("n_gaussians", self.n_gaussians),
            ("eval_samples", self.eval_samples),
            ("sinkhorn_iterations", self.sinkhorn_iterations),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be positive"));
            }
        }
        if self.data_dim < 2 {
            return Err(ConfigError::invalid("data_dim", "the mixture ring needs at least 2 dimensions"));
        }
        for (field, value) in [("d_lr", self.d_lr), ("g_lr", self.g_lr), ("lam", self.lam)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(field, format!("{value} must be finite and non-negative")));
            }
        }
        for (field, value) in [("b1", self.b1), ("b2", self.b2)] {
            if !(0.0..1.0).contains(&value) {
                return Err(ConfigError::invalid(field, format!("{value} must lie in [0, 1)")));
            }
        }
        for (field, value) in [
            ("ring_radius", self.ring_radius),
            ("component_std", self.component_std),
            ("sinkhorn_epsilon", self.sinkhorn_epsilon),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::invalid(field, format!("{value} must be finite and positive")));
            }
        }
        if let Some(eps) = self.score_clamp {
            if !(eps > 0.0 && eps < 0.5) {
                return Err(ConfigError::invalid("score_clamp", format!("{eps} must lie in (0, 0.5)")));
            }
        }
        Ok(())
    }

    /// File stem identifying a run by its regularization weight, learning
    /// rates, discriminator sub-steps, seed and component count.
    pub fn run_name(&self) -> String {
        format!(
            "GAN_Constraint1_lam={}_dlr={}_glr={}_dloop={}_seed={}_nGaussians={}",
            self.lam, self.d_lr, self.g_lr, self.d_steps, self.seed, self.n_gaussians
        )
    }

    /// Path of the trajectory CSV written at the end of a run.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}_EM.csv", self.run_name()))
    }
}
