use crate::error::{Result, TrainError};

/// Lower bound applied to every log term of the binary cross-entropy.
const BCE_LOG_FLOOR: f32 = -100.0;
const BCE_GRAD_EPS: f32 = 1e-12;

#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl Matrix {
    pub fn zeros(r: usize, c: usize) -> Self {
        Matrix {
            rows: r,
            cols: c,
            data: vec![0.0; r * c],
        }
    }

    pub fn filled(r: usize, c: usize, value: f32) -> Self {
        Matrix {
            rows: r,
            cols: c,
            data: vec![value; r * c],
        }
    }

    pub fn from_vec(r: usize, c: usize, v: Vec<f32>) -> Self {
        assert_eq!(v.len(), r * c);
        Matrix {
            rows: r,
            cols: c,
            data: v,
        }
    }

    pub fn get(&self, r: usize, c: usize) -> f32 {
        self.data[r * self.cols + c]
    }

    pub fn set(&mut self, r: usize, c: usize, v: f32) {
        self.data[r * self.cols + c] = v;
    }

    pub fn row(&self, r: usize) -> &[f32] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn matmul(a: &Matrix, b: &Matrix) -> Matrix {
        assert_eq!(a.cols, b.rows);
        let mut out = vec![0.0; a.rows * b.cols];
        for i in 0..a.rows {
            let a_row = &a.data[i * a.cols..(i + 1) * a.cols];
            for k in 0..a.cols {
                let a_val = a_row[k];
                let b_row = &b.data[k * b.cols..(k + 1) * b.cols];
                for j in 0..b.cols {
                    out[i * b.cols + j] += a_val * b_row[j];
                }
            }
        }
        Matrix::from_vec(a.rows, b.cols, out)
    }

    pub fn add(&self, other: &Matrix) -> Matrix {
        assert_eq!(self.rows, other.rows);
        assert_eq!(self.cols, other.cols);
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a + b)
            .collect();
        Matrix::from_vec(self.rows, self.cols, data)
    }

    /// Add a `1 x cols` row to every row of `self`.
    pub fn add_row(&mut self, row: &Matrix) {
        assert_eq!(row.rows, 1);
        assert_eq!(row.cols, self.cols);
        for chunk in self.data.chunks_mut(self.cols) {
            for (v, &b) in chunk.iter_mut().zip(row.data.iter()) {
                *v += b;
            }
        }
    }

    /// Column sums as a `1 x cols` matrix.
    pub fn sum_rows(&self) -> Matrix {
        let mut out = vec![0.0; self.cols];
        for chunk in self.data.chunks(self.cols.max(1)) {
            for (o, &v) in out.iter_mut().zip(chunk.iter()) {
                *o += v;
            }
        }
        Matrix::from_vec(1, self.cols, out)
    }

    pub fn transpose(&self) -> Matrix {
        let mut v = vec![0.0; self.rows * self.cols];
        for i in 0..self.rows {
            for j in 0..self.cols {
                v[j * self.rows + i] = self.get(i, j);
            }
        }
        Matrix::from_vec(self.cols, self.rows, v)
    }

    /// Stack `top` above `bottom`.
    pub fn vstack(top: &Matrix, bottom: &Matrix) -> Matrix {
        assert_eq!(top.cols, bottom.cols);
        let mut data = Vec::with_capacity(top.data.len() + bottom.data.len());
        data.extend_from_slice(&top.data);
        data.extend_from_slice(&bottom.data);
        Matrix::from_vec(top.rows + bottom.rows, top.cols, data)
    }

    /// Split into the first `at` rows and the remainder.
    pub fn split_rows(&self, at: usize) -> (Matrix, Matrix) {
        assert!(at <= self.rows);
        let (head, tail) = self.data.split_at(at * self.cols);
        (
            Matrix::from_vec(at, self.cols, head.to_vec()),
            Matrix::from_vec(self.rows - at, self.cols, tail.to_vec()),
        )
    }
}

/// Mean binary cross-entropy between probabilities `pred` and labels `target`.
///
/// Returns the loss together with its gradient with respect to `pred`. Log
/// terms are floored at -100 so a saturated prediction gives a large but
/// finite loss.
pub fn bce_loss(pred: &Matrix, target: &Matrix) -> (f32, Matrix) {
    assert_eq!(pred.data.len(), target.data.len());
    let n = pred.data.len().max(1) as f32;
    let mut grad = Matrix::zeros(pred.rows, pred.cols);
    let mut loss = 0.0f32;
    for (i, (&p, &y)) in pred.data.iter().zip(target.data.iter()).enumerate() {
        let log_p = p.ln().max(BCE_LOG_FLOOR);
        let log_q = (1.0 - p).ln().max(BCE_LOG_FLOOR);
        loss -= y * log_p + (1.0 - y) * log_q;
        grad.data[i] = (p - y) / (p * (1.0 - p)).max(BCE_GRAD_EPS) / n;
    }
    (loss / n, grad)
}

/// Components of the regularized discriminator loss.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DiscriminatorLoss {
    pub real: f32,
    pub fake: f32,
    pub penalty: f32,
}

impl DiscriminatorLoss {
    pub fn total(&self) -> f32 {
        self.real + self.fake + self.penalty
    }
}

/// Regularized discriminator loss:
/// `BCE(real, valid) + BCE(fake, fake_labels) + lam * mean((ln real - ln fake)^2)`.
///
/// Returns the loss terms and the gradients with respect to the real and fake
/// scores. With `clamp == None` any score outside the open interval (0, 1)
/// is an error. With `Some(eps)` the scores entering the penalty are clamped
/// to `[eps, 1 - eps]`.
pub fn discriminator_loss(
    real_scores: &Matrix,
    fake_scores: &Matrix,
    valid: &Matrix,
    fake: &Matrix,
    lam: f32,
    clamp: Option<f32>,
) -> Result<(DiscriminatorLoss, Matrix, Matrix)> {
    assert_eq!(real_scores.data.len(), fake_scores.data.len());
    if clamp.is_none() {
        if let Some(&value) = real_scores
            .data
            .iter()
            .chain(fake_scores.data.iter())
            .find(|&&s| !(s > 0.0 && s < 1.0))
        {
            return Err(TrainError::SaturatedScore { value });
        }
    }

    let (real_loss, mut grad_real) = bce_loss(real_scores, valid);
    let (fake_loss, mut grad_fake) = bce_loss(fake_scores, fake);

    let n = real_scores.data.len().max(1) as f32;
    let mut penalty = 0.0f32;
    for i in 0..real_scores.data.len() {
        let (r, r_live) = clamp_score(real_scores.data[i], clamp);
        let (f, f_live) = clamp_score(fake_scores.data[i], clamp);
        let gap = r.ln() - f.ln();
        penalty += gap * gap;
        if r_live {
            grad_real.data[i] += 2.0 * lam * gap / (r * n);
        }
        if f_live {
            grad_fake.data[i] -= 2.0 * lam * gap / (f * n);
        }
    }
    penalty = lam * penalty / n;

    Ok((
        DiscriminatorLoss {
            real: real_loss,
            fake: fake_loss,
            penalty,
        },
        grad_real,
        grad_fake,
    ))
}

/// Returns the clamped score and whether the gradient flows through it.
fn clamp_score(s: f32, clamp: Option<f32>) -> (f32, bool) {
    match clamp {
        None => (s, true),
        Some(eps) => {
            if s <= eps {
                (eps, false)
            } else if s >= 1.0 - eps {
                (1.0 - eps, false)
            } else {
                (s, true)
            }
        }
    }
}
