//! Names the sampler logs under. Each is a `tracing` target, so a single
//! event can be enabled alone (`RUST_LOG=sampler.update=debug`).

use serde::{Deserialize, Serialize};

/// Stages of an estimation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Argument parsing, config resolution, data loading.
    Init,
    /// Maximum-likelihood initialization.
    Fit,
    /// Discarded Gibbs cycles.
    BurnIn,
    /// Retained Gibbs cycles.
    Sample,
    /// Synthetic data generation.
    Generate,
    /// Serializing results to stdout.
    Output,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Init => "init",
            Stage::Fit => "fit",
            Stage::BurnIn => "burn_in",
            Stage::Sample => "sample",
            Stage::Generate => "generate",
            Stage::Output => "output",
        })
    }
}

pub mod event_names {
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";
    pub const RUN_FAILED: &str = "run.failed";

    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const INPUT_LOADED: &str = "input.loaded";

    pub const FIT_STARTED: &str = "fit.started";
    pub const FIT_ITERATION: &str = "fit.iteration";
    pub const FIT_CONVERGED: &str = "fit.converged";
    pub const FIT_FINISHED: &str = "fit.finished";

    pub const SAMPLER_CREATED: &str = "sampler.created";
    pub const SAMPLER_BURN_IN: &str = "sampler.burn_in";
    pub const SAMPLER_ITERATION: &str = "sampler.iteration";
    pub const SAMPLER_UPDATE: &str = "sampler.update";
    pub const SAMPLER_FINISHED: &str = "sampler.finished";

    pub const TMATRIX_COMPONENTS: &str = "tmatrix.components";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_serialization_matches_display() {
        for stage in [
            Stage::Init,
            Stage::Fit,
            Stage::BurnIn,
            Stage::Sample,
            Stage::Generate,
            Stage::Output,
        ] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }
}
