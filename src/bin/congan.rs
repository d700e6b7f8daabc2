use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use congan::Config;

/// Train a GAN with a log-confidence gap penalty on a ring of Gaussians and
/// record the OT distance after every step.
#[derive(Parser, Debug)]
#[command(name = "congan", version)]
struct Args {
    /// TOML or JSON file with hyperparameters; flags below override it
    config: Option<PathBuf>,

    #[arg(long)]
    n_steps: Option<usize>,
    #[arg(long)]
    batch_size: Option<usize>,
    /// Width of the hidden layers
    #[arg(long)]
    latent_dim: Option<usize>,
    /// Accelerator index to try before falling back to the CPU
    #[arg(long)]
    gpu: Option<usize>,
    /// Generator noise dimensionality
    #[arg(long)]
    z_dim: Option<usize>,
    #[arg(long)]
    d_lr: Option<f32>,
    #[arg(long)]
    g_lr: Option<f32>,
    #[arg(long)]
    b1: Option<f32>,
    #[arg(long)]
    b2: Option<f32>,
    /// Discriminator updates per outer step
    #[arg(long)]
    d_steps: Option<usize>,
    /// Regularization weight
    #[arg(long)]
    lam: Option<f32>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    n_gaussians: Option<usize>,
    /// Sample size of the distance estimator
    #[arg(long)]
    eval_samples: Option<usize>,
    /// Clamp discriminator scores into [eps, 1 - eps] before taking logs
    #[arg(long)]
    score_clamp: Option<f32>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<Config, congan::error::ConfigError> {
        let mut cfg = match &self.config {
            Some(path) => Config::from_path(path)?,
            None => Config::default(),
        };
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(v) = self.$field {
                    cfg.$field = v;
                })*
            };
        }
        set!(n_steps, batch_size, latent_dim, gpu, z_dim, d_lr, g_lr, b1, b2, d_steps, lam, seed, n_gaussians, eval_samples, output_dir);
        if self.score_clamp.is_some() {
            cfg.score_clamp = self.score_clamp;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = match Args::parse().into_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    log::info!("training {}", cfg.run_name());

    match congan::run(&cfg) {
        Ok(path) => {
            log::info!("trajectory saved to {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("training aborted: {e}");
            ExitCode::FAILURE
        }
    }
}
