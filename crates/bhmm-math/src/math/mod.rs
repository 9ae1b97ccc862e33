//! Numerical building blocks, one concern per module.

pub mod categorical;
pub mod dirichlet;
pub mod normal;
pub mod stable;
