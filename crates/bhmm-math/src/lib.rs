//! Numerics for Bayesian HMM inference: stable log-domain arithmetic,
//! Gaussian densities, categorical and Dirichlet draws.

pub mod math;

pub use math::categorical::*;
pub use math::dirichlet;
pub use math::normal::*;
pub use math::stable::*;
