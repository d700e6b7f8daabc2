use std::path::PathBuf;

use approx::assert_relative_eq;
use congan::config::Config;
use congan::error::{ConfigError, TrainError};
use congan::layers::LinearT;
use congan::logging::{Callback, ReportCollector};
use congan::math::Matrix;
use congan::mixture::MixtureOfGaussians;
use congan::models::{Discriminator, Generator};
use congan::rng::{normal_matrix, rng_for, Stream};
use congan::train_gan::{ConGan, Labels};
use congan::MetricTrajectory;

/// Maps every noise vector to the same point.
struct ConstGenerator {
    point: Vec<f32>,
    z_dim: usize,
}

impl Generator for ConstGenerator {
    fn z_dim(&self) -> usize {
        self.z_dim
    }

    fn out_dim(&self) -> usize {
        self.point.len()
    }

    fn forward(&self, z: &Matrix) -> Matrix {
        let data = (0..z.rows).flat_map(|_| self.point.iter().copied()).collect();
        Matrix::from_vec(z.rows, self.point.len(), data)
    }

    fn forward_train(&mut self, z: &Matrix) -> Matrix {
        self.forward(z)
    }

    fn backward(&mut self, _grad_out: &Matrix) {}

    fn zero_grad(&mut self) {}

    fn parameters(&mut self) -> Vec<&mut LinearT> {
        Vec::new()
    }
}

/// Gives every input the same score.
struct ConstDiscriminator {
    score: f32,
    input_dim: usize,
}

impl Discriminator for ConstDiscriminator {
    fn forward(&self, x: &Matrix) -> Matrix {
        Matrix::filled(x.rows, 1, self.score)
    }

    fn forward_train(&mut self, x: &Matrix) -> Matrix {
        self.forward(x)
    }

    fn backward(&mut self, grad_prob: &Matrix) -> Matrix {
        Matrix::zeros(grad_prob.rows, self.input_dim)
    }

    fn zero_grad(&mut self) {}

    fn parameters(&mut self) -> Vec<&mut LinearT> {
        Vec::new()
    }
}

fn small_config() -> Config {
    Config {
        n_steps: 4,
        batch_size: 32,
        latent_dim: 16,
        z_dim: 8,
        d_steps: 2,
        lam: 0.3,
        seed: 7,
        n_gaussians: 4,
        eval_samples: 48,
        sinkhorn_iterations: 50,
        sinkhorn_epsilon: 0.05,
        ..Config::default()
    }
}

fn stub_gan(cfg: Config, score: f32) -> ConGan<ConstGenerator, ConstDiscriminator> {
    let target = MixtureOfGaussians::new(vec![0.5, 0.5], cfg.ring_radius, cfg.component_std, 2).unwrap();
    let generator = ConstGenerator {
        point: vec![0.5, -0.25],
        z_dim: cfg.z_dim,
    };
    let discriminator = ConstDiscriminator { score, input_dim: 2 };
    ConGan::with_parts(cfg, generator, discriminator, target).unwrap()
}

fn weights_of(params: Vec<&mut LinearT>) -> Vec<Vec<f32>> {
    params
        .into_iter()
        .flat_map(|p| [p.w.data.clone(), p.b.data.clone()])
        .collect()
}

#[test]
fn constant_stubs_record_mean_distance_each_step() {
    let cfg = Config {
        n_steps: 3,
        batch_size: 16,
        d_steps: 1,
        lam: 0.0,
        n_gaussians: 2,
        z_dim: 4,
        eval_samples: 64,
        seed: 11,
        ..Config::default()
    };
    let mut gan = stub_gan(cfg.clone(), 0.5);
    let traj = gan.train_with_callbacks(&mut []).unwrap();
    assert_eq!(traj.len(), 3);

    let times = traj.times();
    assert!(times.windows(2).all(|w| w[0] < w[1]), "{times:?}");

    let target = MixtureOfGaussians::new(vec![0.5, 0.5], cfg.ring_radius, cfg.component_std, 2).unwrap();
    let mut rng = rng_for(cfg.seed, Stream::Evaluation);
    for record in traj.rows() {
        let _noise = normal_matrix(cfg.eval_samples, cfg.z_dim, &mut rng);
        let y = target.sample(cfg.eval_samples, &mut rng);
        let expected = (0..y.rows)
            .map(|j| {
                let dx = 0.5f32 as f64 - y.get(j, 0) as f64;
                let dy = -0.25f32 as f64 - y.get(j, 1) as f64;
                (dx * dx + dy * dy).sqrt()
            })
            .sum::<f64>()
            / y.rows as f64;
        assert_relative_eq!(record.distance, expected, max_relative = 1e-9);
    }
}

#[test]
fn trajectory_has_one_row_per_step_with_monotone_time() {
    let cfg = small_config();
    let mut gan = ConGan::new(cfg.clone()).unwrap();
    let traj = gan.train_with_callbacks(&mut []).unwrap();
    assert_eq!(traj.len(), cfg.n_steps);
    assert!(traj.times().windows(2).all(|w| w[0] <= w[1]));
    assert!(traj.distances().iter().all(|d| d.is_finite() && *d >= 0.0));
}

#[test]
fn same_seed_gives_identical_distances() {
    let mut a = ConGan::new(small_config()).unwrap();
    let mut b = ConGan::new(small_config()).unwrap();
    let ta = a.train_with_callbacks(&mut []).unwrap();
    let tb = b.train_with_callbacks(&mut []).unwrap();
    assert_eq!(ta.distances(), tb.distances());
    assert_eq!(
        weights_of(a.generator_mut().parameters()),
        weights_of(b.generator_mut().parameters())
    );
}

#[test]
fn different_seed_changes_the_run() {
    let mut a = ConGan::new(small_config()).unwrap();
    let mut b = ConGan::new(Config { seed: 8, ..small_config() }).unwrap();
    let ta = a.train_with_callbacks(&mut []).unwrap();
    let tb = b.train_with_callbacks(&mut []).unwrap();
    assert_ne!(ta.distances(), tb.distances());
}

#[test]
fn unregularized_discriminator_loss_is_non_negative() {
    let mut gan = ConGan::new(Config { lam: 0.0, ..small_config() }).unwrap();
    let mut collector = ReportCollector::default();
    gan.train_with_callbacks(&mut [&mut collector as &mut dyn Callback]).unwrap();
    assert_eq!(collector.reports.len(), 4);
    for report in &collector.reports {
        assert_eq!(report.d_loss.penalty, 0.0);
        assert!(report.d_loss.total() >= 0.0);
    }
}

#[test]
fn penalty_only_adds_to_discriminator_loss() {
    let mut gan = ConGan::new(Config { lam: 2.0, ..small_config() }).unwrap();
    let mut collector = ReportCollector::default();
    gan.train_with_callbacks(&mut [&mut collector as &mut dyn Callback]).unwrap();
    for report in &collector.reports {
        let loss = report.d_loss;
        assert!(loss.penalty >= 0.0);
        assert!(loss.total() >= loss.real + loss.fake);
    }
}

#[test]
fn saturated_score_aborts_when_unguarded() {
    for score in [0.0f32, 1.0] {
        let mut gan = stub_gan(small_config(), score);
        match gan.train_with_callbacks(&mut []) {
            Err(TrainError::SaturatedScore { value }) => assert_eq!(value, score),
            other => panic!("expected a saturated score error, got {other:?}"),
        }
    }
}

#[test]
fn saturated_score_is_clamped_when_requested() {
    let cfg = Config {
        score_clamp: Some(1e-6),
        ..small_config()
    };
    let mut gan = stub_gan(cfg, 1.0);
    let mut collector = ReportCollector::default();
    let traj = gan.train_with_callbacks(&mut [&mut collector as &mut dyn Callback]).unwrap();
    assert_eq!(traj.len(), 4);
    assert!(collector.reports.iter().all(|r| r.d_loss.total().is_finite()));
}

#[test]
fn zero_discriminator_steps_leave_discriminator_untouched() {
    let mut gan = ConGan::new(Config { d_steps: 0, n_steps: 2, ..small_config() }).unwrap();
    let d_before = weights_of(gan.discriminator_mut().parameters());
    let g_before = weights_of(gan.generator_mut().parameters());

    let mut collector = ReportCollector::default();
    gan.train_with_callbacks(&mut [&mut collector as &mut dyn Callback]).unwrap();

    assert_eq!(weights_of(gan.discriminator_mut().parameters()), d_before);
    assert_ne!(weights_of(gan.generator_mut().parameters()), g_before);
    assert!(collector.reports.iter().all(|r| r.d_loss.total() == 0.0));
    for p in gan.generator_mut().parameters() {
        assert_eq!(p.steps(), 2);
    }
}

#[test]
fn each_outer_step_runs_d_steps_discriminator_updates() {
    let mut gan = ConGan::new(Config { n_steps: 3, d_steps: 2, ..small_config() }).unwrap();
    gan.train_with_callbacks(&mut []).unwrap();
    for p in gan.discriminator_mut().parameters() {
        assert_eq!(p.steps(), 6);
    }
    for p in gan.generator_mut().parameters() {
        assert_eq!(p.steps(), 3);
    }
}

#[test]
fn generator_phase_does_not_touch_discriminator_weights() {
    let cfg = small_config();
    let labels = Labels::new(cfg.batch_size);
    let mut gan = ConGan::new(cfg).unwrap();
    gan.discriminator_step(0, &labels).unwrap();
    let before = weights_of(gan.discriminator_mut().parameters());

    gan.generator_step(0, &labels).unwrap();

    assert_eq!(weights_of(gan.discriminator_mut().parameters()), before);
    for p in gan.discriminator_mut().parameters() {
        assert_eq!(p.steps(), 1);
    }
}

#[test]
fn discriminator_phase_does_not_touch_the_generator() {
    let cfg = small_config();
    let labels = Labels::new(cfg.batch_size);
    let mut gan = ConGan::new(cfg).unwrap();
    gan.generator_step(0, &labels).unwrap();

    let grads_before: Vec<Vec<f32>> = gan
        .generator_mut()
        .parameters()
        .into_iter()
        .map(|p| p.grad_w().data.clone())
        .collect();
    assert!(grads_before.iter().flatten().any(|&g| g != 0.0));
    let weights_before = weights_of(gan.generator_mut().parameters());

    gan.discriminator_step(0, &labels).unwrap();

    let grads_after: Vec<Vec<f32>> = gan
        .generator_mut()
        .parameters()
        .into_iter()
        .map(|p| p.grad_w().data.clone())
        .collect();
    assert_eq!(grads_after, grads_before);
    assert_eq!(weights_of(gan.generator_mut().parameters()), weights_before);
}

#[test]
fn zero_steps_are_rejected_at_construction() {
    let result = ConGan::new(Config { n_steps: 0, ..small_config() });
    assert!(matches!(
        result,
        Err(TrainError::Config(ConfigError::Invalid { field: "n_steps", .. }))
    ));
}

#[test]
fn mismatched_noise_dimension_is_rejected() {
    let cfg = small_config();
    let target = MixtureOfGaussians::new(vec![1.0], 2.0, 0.02, 2).unwrap();
    let generator = ConstGenerator {
        point: vec![0.0, 0.0],
        z_dim: cfg.z_dim + 1,
    };
    let discriminator = ConstDiscriminator { score: 0.5, input_dim: 2 };
    assert!(matches!(
        ConGan::with_parts(cfg, generator, discriminator, target),
        Err(TrainError::Config(ConfigError::Invalid { field: "z_dim", .. }))
    ));
}

#[test]
fn mismatched_generator_output_is_rejected() {
    let cfg = small_config();
    let target = MixtureOfGaussians::new(vec![1.0], 2.0, 0.02, 2).unwrap();
    let generator = ConstGenerator {
        point: vec![0.0, 0.0, 0.0],
        z_dim: cfg.z_dim,
    };
    let discriminator = ConstDiscriminator { score: 0.5, input_dim: 2 };
    assert!(matches!(
        ConGan::with_parts(cfg, generator, discriminator, target),
        Err(TrainError::Config(ConfigError::Invalid { field: "data_dim", .. }))
    ));
}

#[test]
fn run_writes_trajectory_named_after_config() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config {
        output_dir: dir.path().join("images"),
        n_steps: 3,
        ..small_config()
    };
    let path = congan::run(&cfg).unwrap();
    assert_eq!(path, cfg.output_path());
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(
        name,
        "GAN_Constraint1_lam=0.3_dlr=0.0001_glr=0.001_dloop=2_seed=7_nGaussians=4_EM.csv"
    );

    let traj = MetricTrajectory::read_csv(&path).unwrap();
    assert_eq!(traj.len(), 3);
    let header = std::fs::read_to_string(&path).unwrap();
    assert!(header.starts_with("Time,EM\n"));
}

#[test]
fn failed_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out: PathBuf = dir.path().join("images");
    let cfg = Config {
        output_dir: out.clone(),
        n_steps: 0,
        ..small_config()
    };
    assert!(congan::run(&cfg).is_err());
    assert!(!out.exists());
}
