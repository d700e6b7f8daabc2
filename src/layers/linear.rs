use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::math::Matrix;

// Fully-connected layer `y = x W + b`.  During training the layer stores the
// last input it saw so that `backward` can accumulate weight gradients and
// return the gradient for its input.  Each layer also keeps its own Adam
// moment estimates, so the optimizer state belongs to exactly one model.

pub struct LinearT {
    pub w: Matrix,
    pub b: Matrix,
    grad_w: Matrix,
    grad_b: Matrix,
    m_w: Matrix,
    v_w: Matrix,
    m_b: Matrix,
    v_b: Matrix,
    t: usize,
    last_x: Matrix,
}

impl LinearT {
    /// Create a layer with weights and bias drawn uniformly from
    /// `[-1/sqrt(in_dim), 1/sqrt(in_dim))`.
    pub fn new<R: Rng + ?Sized>(in_dim: usize, out_dim: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (in_dim.max(1) as f32).sqrt();
        let init = Uniform::new(-bound, bound);
        let w = Matrix::from_vec(
            in_dim,
            out_dim,
            (0..in_dim * out_dim).map(|_| init.sample(rng)).collect(),
        );
        let b = Matrix::from_vec(1, out_dim, (0..out_dim).map(|_| init.sample(rng)).collect());
        Self::from_parts(w, b)
    }

    /// Build a layer around explicit weights, e.g. for tests.
    pub fn from_parts(w: Matrix, b: Matrix) -> Self {
        assert_eq!(b.rows, 1);
        assert_eq!(b.cols, w.cols);
        Self {
            grad_w: Matrix::zeros(w.rows, w.cols),
            grad_b: Matrix::zeros(1, w.cols),
            m_w: Matrix::zeros(w.rows, w.cols),
            v_w: Matrix::zeros(w.rows, w.cols),
            m_b: Matrix::zeros(1, w.cols),
            v_b: Matrix::zeros(1, w.cols),
            t: 0,
            last_x: Matrix::zeros(0, 0),
            w,
            b,
        }
    }

    pub fn in_dim(&self) -> usize {
        self.w.rows
    }

    pub fn out_dim(&self) -> usize {
        self.w.cols
    }

    /// Inference forward pass; nothing is cached.
    pub fn forward(&self, x: &Matrix) -> Matrix {
        let mut out = Matrix::matmul(x, &self.w);
        out.add_row(&self.b);
        out
    }

    /// Forward pass that remembers `x` for the next `backward`.
    pub fn forward_train(&mut self, x: &Matrix) -> Matrix {
        self.last_x = x.clone();
        self.forward(x)
    }

    /// Accumulate parameter gradients and return the gradient for the input.
    pub fn backward(&mut self, grad_out: &Matrix) -> Matrix {
        let x_t = self.last_x.transpose();
        let grad_w = Matrix::matmul(&x_t, grad_out);
        self.grad_w = self.grad_w.add(&grad_w);
        self.grad_b = self.grad_b.add(&grad_out.sum_rows());
        Matrix::matmul(grad_out, &self.w.transpose())
    }

    pub fn zero_grad(&mut self) {
        self.grad_w = Matrix::zeros(self.grad_w.rows, self.grad_w.cols);
        self.grad_b = Matrix::zeros(1, self.grad_b.cols);
    }

    pub fn grad_w(&self) -> &Matrix {
        &self.grad_w
    }

    pub fn grad_b(&self) -> &Matrix {
        &self.grad_b
    }

    /// Number of Adam steps taken so far.
    pub fn steps(&self) -> usize {
        self.t
    }

    pub fn adam_step(&mut self, lr: f32, beta1: f32, beta2: f32, eps: f32, weight_decay: f32) {
        self.t += 1;
        let bias1 = 1.0 - beta1.powi(self.t as i32);
        let bias2 = 1.0 - beta2.powi(self.t as i32);
        adam_update(
            &mut self.w,
            &self.grad_w,
            &mut self.m_w,
            &mut self.v_w,
            AdamCoeffs { lr, beta1, beta2, eps, weight_decay, bias1, bias2 },
        );
        adam_update(
            &mut self.b,
            &self.grad_b,
            &mut self.m_b,
            &mut self.v_b,
            AdamCoeffs { lr, beta1, beta2, eps, weight_decay, bias1, bias2 },
        );
    }
}

struct AdamCoeffs {
    lr: f32,
    beta1: f32,
    beta2: f32,
    eps: f32,
    weight_decay: f32,
    bias1: f32,
    bias2: f32,
}

fn adam_update(param: &mut Matrix, grad: &Matrix, m: &mut Matrix, v: &mut Matrix, c: AdamCoeffs) {
    for i in 0..param.data.len() {
        let g = grad.data[i] + c.weight_decay * param.data[i];
        m.data[i] = c.beta1 * m.data[i] + (1.0 - c.beta1) * g;
        v.data[i] = c.beta2 * v.data[i] + (1.0 - c.beta2) * g * g;
        let m_hat = m.data[i] / c.bias1;
        let v_hat = v.data[i] / c.bias2;
        param.data[i] -= c.lr * m_hat / (v_hat.sqrt() + c.eps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backward_matches_manual_gradients() {
        let w = Matrix::from_vec(2, 1, vec![0.5, -1.0]);
        let b = Matrix::from_vec(1, 1, vec![0.25]);
        let mut layer = LinearT::from_parts(w, b);
        let x = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]);
        let y = layer.forward_train(&x);
        assert_eq!(y.data, vec![-1.25, -2.25]);

        let grad_in = layer.backward(&Matrix::from_vec(2, 1, vec![1.0, 1.0]));
        assert_eq!(layer.grad_w().data, vec![4.0, 6.0]);
        assert_eq!(layer.grad_b().data, vec![2.0]);
        assert_eq!(grad_in.data, vec![0.5, -1.0, 0.5, -1.0]);
    }

    #[test]
    fn first_adam_step_moves_by_learning_rate() {
        let w = Matrix::from_vec(1, 1, vec![1.0]);
        let b = Matrix::from_vec(1, 1, vec![0.0]);
        let mut layer = LinearT::from_parts(w, b);
        layer.forward_train(&Matrix::from_vec(1, 1, vec![1.0]));
        layer.backward(&Matrix::from_vec(1, 1, vec![2.0]));
        layer.adam_step(0.1, 0.5, 0.999, 1e-8, 0.0);
        assert!((layer.w.data[0] - 0.9).abs() < 1e-5);
        assert!((layer.b.data[0] + 0.1).abs() < 1e-5);
        assert_eq!(layer.steps(), 1);
    }
}
