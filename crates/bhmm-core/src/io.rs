//! Reading observation and model files.
//!
//! An observation file is JSON: either a bare array of trajectories or an
//! object with an `observations` field (the shape `bhmm generate` writes).

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{BhmmError, Result};
use crate::model::Hmm;

#[derive(Deserialize)]
#[serde(untagged)]
enum ObservationFile {
    Bare(Vec<Vec<f64>>),
    Wrapped { observations: Vec<Vec<f64>> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModelFile {
    Model(Hmm),
    Wrapped { model: Hmm },
}

/// Parse observation trajectories from JSON bytes.
pub fn parse_observations(bytes: &[u8]) -> Result<Vec<Vec<f64>>> {
    let file: ObservationFile = serde_json::from_slice(bytes)?;
    let observations = match file {
        ObservationFile::Bare(obs) => obs,
        ObservationFile::Wrapped { observations } => observations,
    };
    if observations.is_empty() {
        return Err(BhmmError::InvalidInput(
            "observation file holds no trajectories".to_string(),
        ));
    }
    Ok(observations)
}

pub fn load_observations(path: &Path) -> Result<Vec<Vec<f64>>> {
    let bytes = fs::read(path)?;
    parse_observations(&bytes)
}

/// Load a model from JSON: a bare [`Hmm`], or any document with a `model`
/// field, such as the output of `bhmm fit` or `bhmm generate`.
pub fn load_model(path: &Path) -> Result<Hmm> {
    let bytes = fs::read(path)?;
    let model = match serde_json::from_slice::<ModelFile>(&bytes)? {
        ModelFile::Model(m) => m,
        ModelFile::Wrapped { model } => model,
    };
    model.validate()?;
    Ok(model)
}
