//! Bayesian Hidden Markov Model Core Library
//!
//! This library provides Bayesian inference of HMM parameters from observed
//! trajectories:
//! - Gibbs sampling of hidden paths, emission parameters and (optionally
//!   reversible) transition matrices
//! - Maximum-likelihood (Baum-Welch) fitting used to start the chain
//! - Gaussian and discrete output models
//! - Synthetic test systems and posterior summaries
//! - Configuration, logging and exit codes for the `bhmm` binary
//!
//! The binary entry point is in `main.rs`.

pub mod config;
pub mod error;
pub mod estimators;
pub mod exit_codes;
pub mod hidden;
pub mod io;
pub mod logging;
pub mod model;
pub mod msm;
pub mod output;
pub mod summary;
pub mod testsystems;

pub use config::{KernelKind, OutputModelType, SamplerConfig};
pub use error::{BhmmError, Result};
pub use estimators::{BayesianHmmSampler, MaximumLikelihoodEstimator, ModelInitializer};
pub use model::{Hmm, ModelSnapshot};
pub use output::{EmissionModel, OutputModel};
