use rand::Rng;

use crate::layers::linear::LinearT;
use crate::layers::{leaky_relu, relu, sigmoid};
use crate::math::Matrix;

/// Maps latent noise to points in the target space.
pub trait Generator {
    /// Noise dimensionality expected by the generator.
    fn z_dim(&self) -> usize;

    /// Dimensionality of the generated points.
    fn out_dim(&self) -> usize;

    /// Forward pass detached from gradient history: nothing is cached, so a
    /// loss computed from the output can never reach the generator weights.
    fn forward(&self, z: &Matrix) -> Matrix;

    /// Forward pass recording what `backward` needs.
    fn forward_train(&mut self, z: &Matrix) -> Matrix;

    /// Accumulate parameter gradients from the gradient of the output.
    fn backward(&mut self, grad_out: &Matrix);

    fn zero_grad(&mut self);

    fn parameters(&mut self) -> Vec<&mut LinearT>;
}

/// Scores points with the probability of being real, in (0, 1).
pub trait Discriminator {
    fn forward(&self, x: &Matrix) -> Matrix;

    fn forward_train(&mut self, x: &Matrix) -> Matrix;

    /// Takes the gradient of the loss with respect to the output
    /// probabilities and returns the gradient for the input.
    fn backward(&mut self, grad_prob: &Matrix) -> Matrix;

    fn zero_grad(&mut self);

    fn parameters(&mut self) -> Vec<&mut LinearT>;
}

/// Two-layer perceptron generator: Linear -> ReLU -> Linear.
pub struct MlpGenerator {
    pub fc1: LinearT,
    pub fc2: LinearT,
    mask: Vec<f32>,
}

impl MlpGenerator {
    pub fn new<R: Rng + ?Sized>(z_dim: usize, hidden_dim: usize, output_dim: usize, rng: &mut R) -> Self {
        let fc1 = LinearT::new(z_dim, hidden_dim, rng);
        let fc2 = LinearT::new(hidden_dim, output_dim, rng);
        Self {
            fc1,
            fc2,
            mask: Vec::new(),
        }
    }
}

impl Generator for MlpGenerator {
    fn z_dim(&self) -> usize {
        self.fc1.in_dim()
    }

    fn out_dim(&self) -> usize {
        self.fc2.out_dim()
    }

    fn forward(&self, z: &Matrix) -> Matrix {
        let mut h = self.fc1.forward(z);
        relu::forward_inplace(&mut h);
        self.fc2.forward(&h)
    }

    fn forward_train(&mut self, z: &Matrix) -> Matrix {
        let mut h = self.fc1.forward_train(z);
        self.mask = relu::forward_matrix(&mut h);
        self.fc2.forward_train(&h)
    }

    fn backward(&mut self, grad_out: &Matrix) {
        let mut grad_h = self.fc2.backward(grad_out);
        relu::backward(&mut grad_h, &self.mask);
        self.fc1.backward(&grad_h);
    }

    fn zero_grad(&mut self) {
        self.fc1.zero_grad();
        self.fc2.zero_grad();
    }

    fn parameters(&mut self) -> Vec<&mut LinearT> {
        vec![&mut self.fc1, &mut self.fc2]
    }
}

/// Two-layer perceptron discriminator: Linear -> leaky ReLU -> Linear -> sigmoid.
pub struct MlpDiscriminator {
    pub fc1: LinearT,
    pub fc2: LinearT,
    mask: Vec<f32>,
    out_cache: Matrix,
}

impl MlpDiscriminator {
    pub fn new<R: Rng + ?Sized>(input_dim: usize, hidden_dim: usize, rng: &mut R) -> Self {
        let fc1 = LinearT::new(input_dim, hidden_dim, rng);
        let fc2 = LinearT::new(hidden_dim, 1, rng);
        Self {
            fc1,
            fc2,
            mask: Vec::new(),
            out_cache: Matrix::zeros(0, 0),
        }
    }
}

impl Discriminator for MlpDiscriminator {
    fn forward(&self, x: &Matrix) -> Matrix {
        let mut h = self.fc1.forward(x);
        leaky_relu::forward_inplace(&mut h);
        let mut out = self.fc2.forward(&h);
        sigmoid::forward_matrix(&mut out);
        out
    }

    fn forward_train(&mut self, x: &Matrix) -> Matrix {
        let mut h = self.fc1.forward_train(x);
        self.mask = leaky_relu::forward_matrix(&mut h);
        let mut out = self.fc2.forward_train(&h);
        sigmoid::forward_matrix(&mut out);
        self.out_cache = out.clone();
        out
    }

    fn backward(&mut self, grad_prob: &Matrix) -> Matrix {
        let mut g = grad_prob.clone();
        sigmoid::backward(&mut g, &self.out_cache);
        let mut grad_h = self.fc2.backward(&g);
        leaky_relu::backward(&mut grad_h, &self.mask);
        self.fc1.backward(&grad_h)
    }

    fn zero_grad(&mut self) {
        self.fc1.zero_grad();
        self.fc2.zero_grad();
    }

    fn parameters(&mut self) -> Vec<&mut LinearT> {
        vec![&mut self.fc1, &mut self.fc2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn detached_forward_matches_training_forward() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut g = MlpGenerator::new(4, 8, 2, &mut rng);
        let z = Matrix::from_vec(3, 4, (0..12).map(|i| i as f32 * 0.1 - 0.5).collect());
        let detached = g.forward(&z);
        let tracked = g.forward_train(&z);
        assert_eq!(detached, tracked);
        assert_eq!((tracked.rows, tracked.cols), (3, 2));
    }

    #[test]
    fn discriminator_scores_are_probabilities() {
        let mut rng = StdRng::seed_from_u64(11);
        let d = MlpDiscriminator::new(2, 16, &mut rng);
        let x = Matrix::from_vec(4, 2, vec![0.0, 0.0, 2.0, 0.0, -2.0, 1.0, 0.5, -0.5]);
        let scores = d.forward(&x);
        assert_eq!((scores.rows, scores.cols), (4, 1));
        assert!(scores.data.iter().all(|&s| s > 0.0 && s < 1.0));
    }

    #[test]
    fn discriminator_input_gradient_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut d = MlpDiscriminator::new(2, 8, &mut rng);
        let x = Matrix::from_vec(1, 2, vec![0.3, -0.7]);
        d.forward_train(&x);
        let grad = d.backward(&Matrix::from_vec(1, 1, vec![1.0]));
        let h = 1e-3f32;
        for i in 0..2 {
            let mut up = x.clone();
            up.data[i] += h;
            let mut down = x.clone();
            down.data[i] -= h;
            let numeric = (d.forward(&up).data[0] - d.forward(&down).data[0]) / (2.0 * h);
            assert!((numeric - grad.data[i]).abs() < 1e-3, "{numeric} vs {}", grad.data[i]);
        }
    }
}
