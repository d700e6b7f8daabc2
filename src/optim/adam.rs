use crate::layers::LinearT;

/// Adam hyperparameters. The moment estimates themselves live in each
/// [`LinearT`], so one `Adam` instance drives exactly one model.
#[derive(Clone, Debug)]
pub struct Adam {
    pub lr: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub eps: f32,
    pub weight_decay: f32,
}

impl Adam {
    pub fn new(lr: f32, beta1: f32, beta2: f32, eps: f32, weight_decay: f32) -> Self {
        Self { lr, beta1, beta2, eps, weight_decay }
    }

    /// Adam with the usual `eps = 1e-8` and no weight decay.
    pub fn with_betas(lr: f32, beta1: f32, beta2: f32) -> Self {
        Self::new(lr, beta1, beta2, 1e-8, 0.0)
    }

    pub fn step(&mut self, params: &mut [&mut LinearT]) {
        for p in params.iter_mut() {
            p.adam_step(self.lr, self.beta1, self.beta2, self.eps, self.weight_decay);
        }
    }
}
