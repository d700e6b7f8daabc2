use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Invalid hyperparameters or an unreadable configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum MixtureError {
    #[error("mixture needs at least one component")]
    Empty,
    #[error("mixture weight {index} is {value}, weights must be non-negative and finite")]
    NegativeWeight { index: usize, value: f64 },
    #[error("mixture weights sum to {sum}, expected 1")]
    NotNormalized { sum: f64 },
    #[error("mixture dimension must be at least 2, got {0}")]
    Dimension(usize),
    #[error("point has dimension {got}, mixture has dimension {expected}")]
    PointDimension { expected: usize, got: usize },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("cannot compute a transport cost between empty point sets")]
    Empty,
    #[error("point sets live in different dimensions ({0} vs {1})")]
    DimensionMismatch(usize, usize),
    #[error("sinkhorn produced a non-finite cost")]
    NonFinite,
}

/// Anything that aborts a training run.
#[derive(Error, Debug)]
pub enum TrainError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Mixture(#[from] MixtureError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("discriminator score {value} is outside (0, 1); its logarithm is undefined")]
    SaturatedScore { value: f32 },
    #[error("{which} loss became non-finite at step {step}")]
    NonFiniteLoss { which: &'static str, step: usize },
    #[error("failed to write metrics: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, TrainError>;
