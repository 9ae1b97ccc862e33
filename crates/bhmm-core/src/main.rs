//! bhmm - Bayesian hidden Markov model estimation
//!
//! The main entry point for the `bhmm` binary, handling:
//! - Posterior sampling of HMM parameters from observation files
//! - Maximum-likelihood fitting
//! - Synthetic data generation from test models
//!
//! Result documents go to stdout as JSON; logs go to stderr.

use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, error, info, info_span};

use bhmm_core::config::{load_config, ConfigError, ConfigOptions};
use bhmm_core::error::Result;
use bhmm_core::estimators::{BayesianHmmSampler, MaximumLikelihoodEstimator};
use bhmm_core::exit_codes::ExitCode;
use bhmm_core::io::{load_model, load_observations};
use bhmm_core::logging::{
    event_names, generate_run_id, init_logging, LogConfig, LogFormat, LogLevel, Stage,
};
use bhmm_core::summary::{summarize, PosteriorSummary, DEFAULT_CREDIBLE_MASS};
use bhmm_core::testsystems::{dalton_model, generate_synthetic_dataset, TestModelParams};
use bhmm_core::{Hmm, KernelKind, ModelSnapshot, OutputModelType, SamplerConfig};

/// Bayesian HMM estimation by Gibbs sampling
#[derive(Parser)]
#[command(name = "bhmm")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Sampler config file (.toml or .json); falls back to BHMM_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format on stderr (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Draw posterior samples of an HMM from observation trajectories
    Sample(SampleArgs),

    /// Fit an HMM by maximum likelihood (Baum-Welch)
    Fit(FitArgs),

    /// Simulate trajectories from a synthetic test model
    Generate(GenerateArgs),

    /// Print version information
    Version,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Sample(_) => "sample",
            Commands::Fit(_) => "fit",
            Commands::Generate(_) => "generate",
            Commands::Version => "version",
        }
    }
}

/// Model options shared by `sample` and `fit`
#[derive(Args, Debug)]
struct ModelArgs {
    /// Observation file: JSON array of trajectories, or {"observations": [...]}
    #[arg(long, short = 'i')]
    input: PathBuf,

    /// Number of hidden states
    #[arg(long, short = 'n')]
    nstates: Option<usize>,

    /// Enforce detailed balance
    #[arg(long, conflicts_with = "non_reversible")]
    reversible: bool,

    /// Allow transition matrices without detailed balance
    #[arg(long)]
    non_reversible: bool,

    /// Output model type (gaussian, discrete)
    #[arg(long = "type")]
    output_type: Option<OutputModelType>,

    /// Alphabet size for discrete observations
    #[arg(long)]
    nsymbols: Option<usize>,

    /// Hidden-path kernel (scaled, log)
    #[arg(long)]
    kernel: Option<KernelKind>,

    /// RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct SampleArgs {
    #[command(flatten)]
    model: ModelArgs,

    /// Number of retained samples
    #[arg(long, default_value_t = 100)]
    nsamples: usize,

    /// Discarded cycles before the first sample
    #[arg(long, default_value_t = 0)]
    nburn: usize,

    /// Cycles between retained samples
    #[arg(long, default_value_t = 1)]
    nthin: usize,

    /// Reversible transition-matrix sweeps per cycle
    #[arg(long)]
    steps: Option<usize>,

    /// Pseudo-count added to every transition count
    #[arg(long)]
    prior: Option<f64>,

    /// Include hidden paths in every sample
    #[arg(long)]
    keep_hidden_paths: bool,

    /// Start the chain from this model (JSON, e.g. `bhmm fit` output)
    #[arg(long)]
    initial_model: Option<PathBuf>,

    /// Probability mass of summary credible intervals
    #[arg(long, default_value_t = DEFAULT_CREDIBLE_MASS)]
    credible_mass: f64,
}

#[derive(Args, Debug)]
struct FitArgs {
    #[command(flatten)]
    model: ModelArgs,

    /// Maximum EM iterations
    #[arg(long)]
    maxit: Option<usize>,

    /// Convergence threshold on the log-likelihood change
    #[arg(long)]
    accuracy: Option<f64>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Number of hidden states
    #[arg(long, short = 'n', default_value_t = 3)]
    nstates: usize,

    /// Number of trajectories
    #[arg(long, default_value_t = 1)]
    ntrajectories: usize,

    /// Observations per trajectory
    #[arg(long, default_value_t = 1000)]
    length: usize,

    /// Output model type (gaussian, discrete)
    #[arg(long = "type", default_value_t = OutputModelType::Gaussian)]
    output_type: OutputModelType,

    /// Alphabet size for discrete models (default 2 * nstates)
    #[arg(long)]
    nsymbols: Option<usize>,

    /// Generate from a model without detailed balance
    #[arg(long)]
    non_reversible: bool,

    /// RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                ExitCode::Usage
            } else {
                ExitCode::Success
            };
            let _ = e.print();
            std::process::exit(code.as_i32());
        }
    };

    let log_config = LogConfig::from_env(cli_log_level(&cli.global), cli.global.log_format);
    init_logging(&log_config);

    let run_id = generate_run_id();
    let command = cli.command.name();
    let span = info_span!("run", run_id = %run_id, command = command);
    let exit_code = span.in_scope(|| {
        info!(target: event_names::RUN_STARTED, "bhmm {} started", command);
        let result = match &cli.command {
            Commands::Sample(args) => run_sample(&cli.global, args, &run_id),
            Commands::Fit(args) => run_fit(&cli.global, args, &run_id),
            Commands::Generate(args) => run_generate(args),
            Commands::Version => print_version(),
        };
        let exit_code = match result {
            Ok(()) => ExitCode::Success,
            Err(e) => {
                error!(
                    target: event_names::RUN_FAILED,
                    code = e.code(),
                    numerical = e.is_numerical(),
                    "{}",
                    e
                );
                eprintln!("bhmm: {}", e);
                e.exit_code()
            }
        };
        info!(
            target: event_names::RUN_FINISHED,
            exit_code = exit_code.as_i32(),
            "bhmm {} finished",
            command
        );
        exit_code
    });

    std::process::exit(exit_code.as_i32());
}

/// Explicit `--log-level` wins over `-q` / `-v`.
fn cli_log_level(global: &GlobalOpts) -> Option<LogLevel> {
    global
        .log_level
        .or_else(|| LogLevel::from_verbosity(global.quiet, global.verbose))
}

/// Config file (or defaults) overlaid with CLI flags, validated as a whole.
fn resolve_config(global: &GlobalOpts, args: &ModelArgs) -> Result<SamplerConfig> {
    let resolved = load_config(&ConfigOptions {
        config_path: global.config.clone(),
        ignore_env: false,
    })?;
    match &resolved.source_path {
        Some(path) => info!(
            target: event_names::CONFIG_LOADED,
            path = %path.display(),
            "loaded sampler config"
        ),
        None => debug!(target: event_names::CONFIG_DEFAULT_USED, "using default sampler config"),
    }

    let mut config = resolved.sampler;
    if let Some(n) = args.nstates {
        config.nstates = n;
    }
    if args.reversible {
        config.reversible = true;
    }
    if args.non_reversible {
        config.reversible = false;
    }
    if let Some(t) = args.output_type {
        config.output_model_type = t;
    }
    if args.nsymbols.is_some() {
        config.nsymbols = args.nsymbols;
    }
    if let Some(k) = args.kernel {
        config.kernel = k;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    Ok(config)
}

fn validated(config: SamplerConfig) -> Result<SamplerConfig> {
    config.validate().map_err(ConfigError::from)?;
    Ok(config)
}

fn load_input(args: &ModelArgs) -> Result<Vec<Vec<f64>>> {
    let observations = load_observations(&args.input)?;
    info!(
        target: event_names::INPUT_LOADED,
        path = %args.input.display(),
        ntrajectories = observations.len(),
        nobservations = observations.iter().map(Vec::len).sum::<usize>(),
        "loaded observations"
    );
    Ok(observations)
}

#[derive(Serialize)]
struct SampleReport<'a> {
    run_id: &'a str,
    generated_at: String,
    command: &'static str,
    config: &'a SamplerConfig,
    nsamples: usize,
    nburn: usize,
    nthin: usize,
    samples: &'a [ModelSnapshot],
    summary: Option<PosteriorSummary>,
}

#[derive(Serialize)]
struct FitReport<'a> {
    run_id: &'a str,
    generated_at: String,
    command: &'static str,
    config: &'a SamplerConfig,
    log_likelihood: f64,
    iterations: usize,
    converged: bool,
    log_likelihoods: &'a [f64],
    model: &'a Hmm,
}

#[derive(Serialize)]
struct VersionInfo {
    bhmm_version: &'static str,
    rust_version: &'static str,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{}", text);
    Ok(())
}

fn run_sample(global: &GlobalOpts, args: &SampleArgs, run_id: &str) -> Result<()> {
    let mut config = resolve_config(global, &args.model)?;
    if let Some(steps) = args.steps {
        config.transition_matrix_sampling_steps = steps;
    }
    if let Some(prior) = args.prior {
        config.transition_prior = prior;
    }
    let config = validated(config)?;
    let observations = load_input(&args.model)?;
    let initial_model = args.initial_model.as_deref().map(load_model).transpose()?;

    let mut sampler = info_span!("stage", stage = %Stage::Init)
        .in_scope(|| BayesianHmmSampler::new(observations, config.clone(), initial_model))?;
    let samples = sampler.sample(args.nsamples, args.nburn, args.nthin, args.keep_hidden_paths)?;

    let _span = info_span!("stage", stage = %Stage::Output).entered();
    let summary = if samples.is_empty() {
        None
    } else {
        Some(summarize(&samples, args.credible_mass)?)
    };
    print_json(&SampleReport {
        run_id,
        generated_at: chrono::Utc::now().to_rfc3339(),
        command: "sample",
        config: &config,
        nsamples: args.nsamples,
        nburn: args.nburn,
        nthin: args.nthin,
        samples: &samples,
        summary,
    })
}

fn run_fit(global: &GlobalOpts, args: &FitArgs, run_id: &str) -> Result<()> {
    let mut config = resolve_config(global, &args.model)?;
    if let Some(maxit) = args.maxit {
        config.maxit = maxit;
    }
    if let Some(accuracy) = args.accuracy {
        config.accuracy = accuracy;
    }
    let config = validated(config)?;
    let observations = load_input(&args.model)?;

    let fit = info_span!("stage", stage = %Stage::Fit)
        .in_scope(|| MaximumLikelihoodEstimator::new().estimate(&observations, &config))?;
    print_json(&FitReport {
        run_id,
        generated_at: chrono::Utc::now().to_rfc3339(),
        command: "fit",
        config: &config,
        log_likelihood: fit.log_likelihood(),
        iterations: fit.iterations,
        converged: fit.converged,
        log_likelihoods: &fit.log_likelihoods,
        model: &fit.model,
    })
}

fn run_generate(args: &GenerateArgs) -> Result<()> {
    let _span = info_span!("stage", stage = %Stage::Generate).entered();
    let params = TestModelParams {
        reversible: !args.non_reversible,
        ..TestModelParams::with_nstates(args.nstates)
    };
    let model = dalton_model(&params, args.output_type, args.nsymbols)?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let dataset = generate_synthetic_dataset(&model, args.ntrajectories, args.length, &mut rng)?;
    info!(
        ntrajectories = args.ntrajectories,
        length = args.length,
        "generated synthetic dataset"
    );
    print_json(&dataset)
}

fn print_version() -> Result<()> {
    print_json(&VersionInfo {
        bhmm_version: env!("CARGO_PKG_VERSION"),
        rust_version: env!("CARGO_PKG_RUST_VERSION"),
    })
}
