//! Markov state model utilities: count matrices, stationary distributions,
//! maximum-likelihood estimation and posterior sampling of transition
//! matrices.

pub mod analysis;
pub mod estimation;
pub mod sampler;

pub use analysis::{
    connected_sets, count_matrix, is_reversible, is_row_stochastic, lifetimes,
    stationary_distribution, validate_count_matrix, ROW_SUM_TOLERANCE,
};
pub use estimation::estimate_transition_matrix;
pub use sampler::TransitionMatrixSampler;
