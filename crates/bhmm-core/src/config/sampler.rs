//! Typed sampler configuration.

use serde::{Deserialize, Serialize};

/// Emission model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputModelType {
    /// One univariate normal per state.
    #[default]
    Gaussian,
    /// One categorical distribution over symbols per state.
    Discrete,
}

impl std::str::FromStr for OutputModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gaussian" | "normal" => Ok(OutputModelType::Gaussian),
            "discrete" | "categorical" => Ok(OutputModelType::Discrete),
            _ => Err(format!("unknown output model type: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputModelType::Gaussian => write!(f, "gaussian"),
            OutputModelType::Discrete => write!(f, "discrete"),
        }
    }
}

/// Hidden-path kernel implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelKind {
    /// Rescaled probability-space recursion (reference).
    #[default]
    Scaled,
    /// Log-domain recursion.
    Log,
}

impl std::str::FromStr for KernelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scaled" | "reference" | "python" => Ok(KernelKind::Scaled),
            "log" | "logspace" | "log-space" => Ok(KernelKind::Log),
            _ => Err(format!("unknown hidden kernel: {}", s)),
        }
    }
}

impl std::fmt::Display for KernelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelKind::Scaled => write!(f, "scaled"),
            KernelKind::Log => write!(f, "log"),
        }
    }
}

/// Options recognized by the sampler and its initializer.
///
/// Every field has a default so partial config files are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Number of hidden states.
    pub nstates: usize,
    /// Enforce detailed balance on sampled transition matrices.
    pub reversible: bool,
    /// Inner sweeps of the reversible transition-matrix sampler per cycle.
    pub transition_matrix_sampling_steps: usize,
    /// Emission model family.
    #[serde(rename = "type")]
    pub output_model_type: OutputModelType,
    /// Pseudo-count added to every transition count before sampling.
    pub transition_prior: f64,
    /// RNG seed; `None` draws one from the OS.
    pub seed: Option<u64>,
    /// Hidden-path kernel.
    pub kernel: KernelKind,
    /// Alphabet size for discrete emissions; inferred from data when absent.
    pub nsymbols: Option<usize>,
    /// Maximum EM iterations for the maximum-likelihood initializer.
    pub maxit: usize,
    /// EM convergence threshold on the log-likelihood change.
    pub accuracy: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            nstates: 2,
            reversible: true,
            transition_matrix_sampling_steps: 1000,
            output_model_type: OutputModelType::Gaussian,
            transition_prior: 0.0,
            seed: None,
            kernel: KernelKind::Scaled,
            nsymbols: None,
            maxit: 1000,
            accuracy: 1e-3,
        }
    }
}

impl SamplerConfig {
    /// Default configuration for `nstates` states.
    pub fn with_nstates(nstates: usize) -> Self {
        Self {
            nstates,
            ..Default::default()
        }
    }

    /// Set reversibility.
    pub fn reversible(mut self, reversible: bool) -> Self {
        self.reversible = reversible;
        self
    }

    /// Set the number of inner transition-matrix sampler sweeps.
    pub fn sampling_steps(mut self, steps: usize) -> Self {
        self.transition_matrix_sampling_steps = steps;
        self
    }

    /// Set the emission model family.
    pub fn output_model(mut self, output_model_type: OutputModelType) -> Self {
        self.output_model_type = output_model_type;
        self
    }

    /// Set the RNG seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the hidden-path kernel.
    pub fn kernel(mut self, kernel: KernelKind) -> Self {
        self.kernel = kernel;
        self
    }

    /// Set the transition-count pseudo-count.
    pub fn transition_prior(mut self, prior: f64) -> Self {
        self.transition_prior = prior;
        self
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), super::ValidationError> {
        super::validate_sampler_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_model_type_parse() {
        assert_eq!(
            "gaussian".parse::<OutputModelType>().unwrap(),
            OutputModelType::Gaussian
        );
        assert_eq!(
            "Discrete".parse::<OutputModelType>().unwrap(),
            OutputModelType::Discrete
        );
        assert!("poisson".parse::<OutputModelType>().is_err());
    }

    #[test]
    fn kernel_kind_parse_and_display() {
        assert_eq!("log".parse::<KernelKind>().unwrap(), KernelKind::Log);
        assert_eq!("scaled".parse::<KernelKind>().unwrap(), KernelKind::Scaled);
        assert_eq!(KernelKind::Log.to_string(), "log");
        assert!("cuda".parse::<KernelKind>().is_err());
    }

    #[test]
    fn defaults() {
        let config = SamplerConfig::default();
        assert_eq!(config.nstates, 2);
        assert!(config.reversible);
        assert_eq!(config.transition_matrix_sampling_steps, 1000);
        assert_eq!(config.output_model_type, OutputModelType::Gaussian);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn builder() {
        let config = SamplerConfig::with_nstates(4)
            .reversible(false)
            .sampling_steps(10)
            .output_model(OutputModelType::Discrete)
            .seed(7)
            .kernel(KernelKind::Log)
            .transition_prior(1.0);
        assert_eq!(config.nstates, 4);
        assert!(!config.reversible);
        assert_eq!(config.transition_matrix_sampling_steps, 10);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.kernel, KernelKind::Log);
        assert_eq!(config.transition_prior, 1.0);
    }

    #[test]
    fn serde_uses_type_key() {
        let json = r#"{"nstates": 3, "type": "discrete"}"#;
        let config: SamplerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.nstates, 3);
        assert_eq!(config.output_model_type, OutputModelType::Discrete);
        assert!(config.reversible);
    }
}
