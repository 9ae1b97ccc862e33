//! Fuzz target for observation file parsing.
//!
//! Arbitrary bytes must parse into trajectories or return an error, never
//! panic. Parsed data is pushed through input validation as well.

#![no_main]

use bhmm_core::config::SamplerConfig;
use bhmm_core::io::parse_observations;
use bhmm_core::output::{DiscreteOutputModel, OutputModel};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(observations) = parse_observations(data) else {
        return;
    };
    let _ = SamplerConfig::default().validate();
    if let Ok(model) = DiscreteOutputModel::initial_guess(&observations, 2, None) {
        for obs in &observations {
            let _ = model.validate_observations(obs);
        }
    }
});
