pub mod leaky_relu;
pub mod linear;
pub mod relu;
pub mod sigmoid;

pub use linear::LinearT;
