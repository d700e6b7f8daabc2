pub mod config;
pub mod device;
pub mod error;
pub mod layers;
pub mod logging;
pub mod math;
pub mod metrics;
pub mod mixture;
pub mod models;
pub mod optim;
pub mod rng;
pub mod train_gan;
pub mod transport;

pub use config::Config;
pub use error::{Result, TrainError};
pub use metrics::MetricTrajectory;
pub use train_gan::{run, ConGan};
