use std::path::PathBuf;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;

use crate::config::Config;
use crate::device::Device;
use crate::error::{ConfigError, Result, TrainError};
use crate::logging::{Callback, ProgressReporter, StepReport};
use crate::math::{self, DiscriminatorLoss, Matrix};
use crate::metrics::MetricTrajectory;
use crate::mixture::MixtureOfGaussians;
use crate::models::{Discriminator, Generator, MlpDiscriminator, MlpGenerator};
use crate::optim::Adam;
use crate::rng::{normal_matrix, rng_for, Stream};
use crate::transport::OtEstimator;

/// Constant targets for one outer step: ones for real samples, zeros for
/// generated ones.
pub struct Labels {
    pub valid: Matrix,
    pub fake: Matrix,
}

impl Labels {
    pub fn new(batch_size: usize) -> Self {
        Self {
            valid: Matrix::filled(batch_size, 1, 1.0),
            fake: Matrix::zeros(batch_size, 1),
        }
    }
}

/// GAN trainer with a log-confidence gap penalty on the discriminator.
///
/// Each outer step runs `d_steps` discriminator updates, one generator
/// update, then measures the OT distance between generator and target.
pub struct ConGan<G = MlpGenerator, D = MlpDiscriminator> {
    config: Config,
    device: Device,
    generator: G,
    discriminator: D,
    optimizer_g: Adam,
    optimizer_d: Adam,
    target: MixtureOfGaussians,
    estimator: OtEstimator,
    train_rng: StdRng,
    eval_rng: StdRng,
}

impl ConGan {
    /// Build the default MLP generator and discriminator and a mixture with
    /// random weights, all seeded from `config.seed`.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let mut weight_rng = rng_for(config.seed, Stream::MixtureWeights);
        let weights = MixtureOfGaussians::random_weights(config.n_gaussians, &mut weight_rng);
        let target = MixtureOfGaussians::new(
            weights,
            config.ring_radius,
            config.component_std,
            config.data_dim,
        )?;
        let generator = MlpGenerator::new(
            config.z_dim,
            config.latent_dim,
            config.data_dim,
            &mut rng_for(config.seed, Stream::GeneratorInit),
        );
        let discriminator = MlpDiscriminator::new(
            config.data_dim,
            config.latent_dim,
            &mut rng_for(config.seed, Stream::DiscriminatorInit),
        );
        Self::with_parts(config, generator, discriminator, target)
    }
}

impl<G: Generator, D: Discriminator> ConGan<G, D> {
    /// Wrap caller-supplied networks and target distribution.
    pub fn with_parts(config: Config, generator: G, discriminator: D, target: MixtureOfGaussians) -> Result<Self> {
        config.validate()?;
        if generator.z_dim() != config.z_dim {
            return Err(ConfigError::invalid(
                "z_dim",
                format!("generator expects {} noise dimensions", generator.z_dim()),
            )
            .into());
        }
        if generator.out_dim() != config.data_dim {
            return Err(ConfigError::invalid(
                "data_dim",
                format!("generator produces {} dimensions", generator.out_dim()),
            )
            .into());
        }
        if target.dim() != config.data_dim {
            return Err(ConfigError::invalid(
                "data_dim",
                format!("target distribution lives in {} dimensions", target.dim()),
            )
            .into());
        }

        let device = Device::select(config.gpu);
        let optimizer_g = Adam::with_betas(config.g_lr, config.b1, config.b2);
        let optimizer_d = Adam::with_betas(config.d_lr, config.b1, config.b2);
        let estimator = OtEstimator::new(
            config.z_dim,
            config.eval_samples,
            config.sinkhorn_epsilon,
            config.sinkhorn_iterations,
        );
        let train_rng = rng_for(config.seed, Stream::Training);
        let eval_rng = rng_for(config.seed, Stream::Evaluation);
        log::debug!(
            "built trainer on {device}: {} components, weights {:?}",
            target.n_components(),
            target.weights()
        );

        Ok(Self {
            config,
            device,
            generator,
            discriminator,
            optimizer_g,
            optimizer_d,
            target,
            estimator,
            train_rng,
            eval_rng,
        })
    }

    pub fn generator_mut(&mut self) -> &mut G {
        &mut self.generator
    }

    pub fn discriminator_mut(&mut self) -> &mut D {
        &mut self.discriminator
    }

    /// One discriminator update on a fresh real batch and a fresh detached
    /// fake batch.
    pub fn discriminator_step(&mut self, step: usize, labels: &Labels) -> Result<DiscriminatorLoss> {
        let batch = self.config.batch_size;
        self.discriminator.zero_grad();

        let real = self.target.sample(batch, &mut self.train_rng);
        let z = normal_matrix(batch, self.config.z_dim, &mut self.train_rng);
        // detached: the generator records nothing for this batch
        let fake = self.generator.forward(&z);

        let scores = self.discriminator.forward_train(&Matrix::vstack(&real, &fake));
        let (real_scores, fake_scores) = scores.split_rows(batch);
        let (loss, grad_real, grad_fake) = math::discriminator_loss(
            &real_scores,
            &fake_scores,
            &labels.valid,
            &labels.fake,
            self.config.lam,
            self.config.score_clamp,
        )?;
        if !loss.total().is_finite() {
            return Err(TrainError::NonFiniteLoss {
                which: "discriminator",
                step,
            });
        }

        self.discriminator.backward(&Matrix::vstack(&grad_real, &grad_fake));
        self.optimizer_d.step(&mut self.discriminator.parameters());
        Ok(loss)
    }

    /// One generator update: the generator is scored against the "real"
    /// labels, gradients flow through the discriminator into the generator,
    /// and only the generator is stepped.
    pub fn generator_step(&mut self, step: usize, labels: &Labels) -> Result<f32> {
        self.generator.zero_grad();
        self.discriminator.zero_grad();

        let z = normal_matrix(self.config.batch_size, self.config.z_dim, &mut self.train_rng);
        let fake = self.generator.forward_train(&z);
        let scores = self.discriminator.forward_train(&fake);
        let (g_loss, grad) = math::bce_loss(&scores, &labels.valid);
        if !g_loss.is_finite() {
            return Err(TrainError::NonFiniteLoss {
                which: "generator",
                step,
            });
        }

        let grad_fake = self.discriminator.backward(&grad);
        self.generator.backward(&grad_fake);
        self.optimizer_g.step(&mut self.generator.parameters());
        Ok(g_loss)
    }

    /// Distance between the current generator and the target.
    pub fn measure(&mut self) -> Result<f64> {
        Ok(self
            .estimator
            .estimate(&self.generator, &self.target, &mut self.eval_rng)?)
    }

    /// Run all outer steps with an in-place progress line.
    pub fn train(&mut self) -> Result<MetricTrajectory> {
        let mut progress = ProgressReporter::new();
        self.train_with_callbacks(&mut [&mut progress])
    }

    /// Run all outer steps, notifying `callbacks` after each one.
    pub fn train_with_callbacks(&mut self, callbacks: &mut [&mut dyn Callback]) -> Result<MetricTrajectory> {
        let n_steps = self.config.n_steps;
        let mut trajectory = MetricTrajectory::with_capacity(n_steps);
        let mut total = Duration::ZERO;

        for cb in callbacks.iter_mut() {
            cb.on_train_begin(n_steps);
        }

        for step in 0..n_steps {
            let t0 = Instant::now();
            let labels = Labels::new(self.config.batch_size);

            let mut d_loss = DiscriminatorLoss::default();
            for _ in 0..self.config.d_steps {
                d_loss = self.discriminator_step(step, &labels)?;
            }
            let g_loss = self.generator_step(step, &labels)?;
            total += t0.elapsed();

            let distance = self.measure()?;
            trajectory.push(total.as_secs_f64(), distance);

            let report = StepReport {
                step,
                n_steps,
                d_loss,
                g_loss,
                distance,
                elapsed: total,
            };
            log::trace!("{}", report.progress_line());
            for cb in callbacks.iter_mut() {
                cb.on_step_end(&report);
            }
        }

        for cb in callbacks.iter_mut() {
            cb.on_train_end(&trajectory);
        }
        if let Some(last) = trajectory.last() {
            log::info!(
                "finished {n_steps} steps on {} in {:.2}s, final OT loss {:.4}",
                self.device,
                last.time,
                last.distance
            );
        }
        Ok(trajectory)
    }
}

/// Train with the default networks and write the trajectory CSV. Returns the
/// path that was written. Nothing is written if training fails.
pub fn run(config: &Config) -> Result<PathBuf> {
    let mut gan = ConGan::new(config.clone())?;
    let trajectory = gan.train()?;
    let path = config.output_path();
    trajectory.write_csv(&path)?;
    log::info!("wrote {} rows to {}", trajectory.len(), path.display());
    Ok(path)
}
