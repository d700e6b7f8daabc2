use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::math::DiscriminatorLoss;
use crate::metrics::MetricTrajectory;

const RUN_LABEL: &str = "Con-GAN";
const PROGRESS_TEMPLATE: &str = "{msg} [{elapsed_precise}]";

/// What happened during one outer training step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepReport {
    pub step: usize,
    pub n_steps: usize,
    /// Loss of the last discriminator sub-step, zero when there were none.
    pub d_loss: DiscriminatorLoss,
    pub g_loss: f32,
    pub distance: f64,
    /// Cumulative training time after this step.
    pub elapsed: Duration,
}

impl StepReport {
    /// Single progress line; the discriminator loss is halved so it is on the
    /// scale of one cross-entropy term.
    pub fn progress_line(&self) -> String {
        format!(
            "{:>10} [step {:5}/{:5}] [D loss: {:.2}] [G loss: {:.2}] [OT loss: {:.2}]",
            RUN_LABEL,
            self.step,
            self.n_steps,
            self.d_loss.total() / 2.0,
            self.g_loss,
            self.distance
        )
    }
}

/// Trait for hooking into the training loop.
pub trait Callback {
    /// Called once before the first step.
    fn on_train_begin(&mut self, _n_steps: usize) {}

    /// Called after each outer step, once its distance has been recorded.
    fn on_step_end(&mut self, _report: &StepReport) {}

    /// Called once after the last step.
    fn on_train_end(&mut self, _trajectory: &MetricTrajectory) {}
}

/// Keeps one progress line up to date in place.
pub struct ProgressReporter {
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self { bar: None }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Callback for ProgressReporter {
    fn on_train_begin(&mut self, n_steps: usize) {
        let bar = ProgressBar::new(n_steps as u64);
        if let Ok(style) = ProgressStyle::with_template(PROGRESS_TEMPLATE) {
            bar.set_style(style);
        }
        self.bar = Some(bar);
    }

    fn on_step_end(&mut self, report: &StepReport) {
        if let Some(bar) = &self.bar {
            bar.set_message(report.progress_line());
            bar.inc(1);
        }
    }

    fn on_train_end(&mut self, trajectory: &MetricTrajectory) {
        if let Some(bar) = self.bar.take() {
            let msg = match trajectory.last() {
                Some(last) => format!("training done, final OT loss {:.4}", last.distance),
                None => "training done".to_string(),
            };
            bar.finish_with_message(msg);
        }
    }
}

/// Collects every step report, mostly useful in tests and notebooks.
#[derive(Default)]
pub struct ReportCollector {
    pub reports: Vec<StepReport>,
}

impl Callback for ReportCollector {
    fn on_step_end(&mut self, report: &StepReport) {
        self.reports.push(*report);
    }
}
