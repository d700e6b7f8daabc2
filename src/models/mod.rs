pub mod gan;

pub use gan::{Discriminator, Generator, MlpDiscriminator, MlpGenerator};
