//! End-to-end tests for the bhmm binary.
//!
//! These run the real binary against files in a temp directory and check
//! the JSON documents on stdout and the exit codes.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get a Command for the bhmm binary with a clean environment.
fn bhmm() -> Command {
    let mut cmd = Command::cargo_bin("bhmm").expect("bhmm binary should exist");
    cmd.env_remove("BHMM_CONFIG")
        .env_remove("BHMM_LOG")
        .env_remove("RUST_LOG")
        .env("BHMM_LOG_FORMAT", "jsonl");
    cmd
}

fn stdout_json(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).expect("stdout should be a JSON document")
}

fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).expect("write fixture");
    path
}

fn generate_into(dir: &TempDir, extra: &[&str]) -> PathBuf {
    let output = bhmm()
        .args(["generate", "--nstates", "2", "--length", "200", "--seed", "5"])
        .args(extra)
        .output()
        .expect("run generate");
    assert!(output.status.success());
    let path = dir.path().join("data.json");
    std::fs::write(&path, &output.stdout).expect("write dataset");
    path
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

// ============================================================================
// generate
// ============================================================================

mod generate {
    use super::*;

    #[test]
    fn writes_observations_states_and_model() {
        let output = bhmm()
            .args(["generate", "--nstates", "3", "--ntrajectories", "2", "--length", "50", "--seed", "1"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let doc = stdout_json(&output.stdout);
        assert_eq!(doc["observations"].as_array().unwrap().len(), 2);
        assert_eq!(doc["hidden_states"][1].as_array().unwrap().len(), 50);
        assert_eq!(doc["model"]["output_model"]["type"], "gaussian");
    }

    #[test]
    fn seeded_runs_are_identical() {
        let run = || {
            bhmm()
                .args(["generate", "--length", "30", "--seed", "9"])
                .output()
                .unwrap()
                .stdout
        };
        assert_eq!(run(), run());
    }
}

// ============================================================================
// sample / fit
// ============================================================================

mod sample {
    use super::*;

    #[test]
    fn generate_then_sample_round_trip() {
        let dir = TempDir::new().unwrap();
        let data = generate_into(&dir, &[]);
        let output = bhmm()
            .args(["sample", "--input", path_arg(&data), "--nstates", "2"])
            .args(["--nsamples", "5", "--nburn", "2", "--steps", "20", "--seed", "3"])
            .args(["--keep-hidden-paths"])
            .output()
            .unwrap();
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

        let doc = stdout_json(&output.stdout);
        let samples = doc["samples"].as_array().unwrap();
        assert_eq!(samples.len(), 5);
        for s in samples {
            for row in s["transition_matrix"].as_array().unwrap() {
                let sum: f64 = row.as_array().unwrap().iter().map(|v| v.as_f64().unwrap()).sum();
                assert!((sum - 1.0).abs() < 1e-9);
            }
            assert_eq!(s["hidden_state_trajectories"][0].as_array().unwrap().len(), 200);
        }
        assert_eq!(doc["summary"]["nsamples"], 5);
        assert_eq!(doc["command"], "sample");
    }

    #[test]
    fn discrete_sampling_with_log_kernel() {
        let dir = TempDir::new().unwrap();
        let data = generate_into(&dir, &["--type", "discrete", "--nsymbols", "4"]);
        bhmm()
            .args(["sample", "--input", path_arg(&data), "--nstates", "2", "--type", "discrete"])
            .args(["--nsamples", "3", "--kernel", "log", "--non-reversible", "--seed", "4"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"discrete\""));
    }

    #[test]
    fn config_file_supplies_defaults() {
        let dir = TempDir::new().unwrap();
        let data = generate_into(&dir, &[]);
        let config = write(
            &dir,
            "bhmm.toml",
            "nstates = 2\nreversible = false\ntransition_matrix_sampling_steps = 5\nseed = 8\n",
        );
        let output = bhmm()
            .args(["sample", "--input", path_arg(&data), "--nsamples", "2"])
            .args(["--config", path_arg(&config)])
            .output()
            .unwrap();
        assert!(output.status.success());
        let doc = stdout_json(&output.stdout);
        assert_eq!(doc["config"]["reversible"], false);
        assert_eq!(doc["config"]["seed"], 8);
    }

    #[test]
    fn fit_output_seeds_sampling() {
        let dir = TempDir::new().unwrap();
        let data = generate_into(&dir, &[]);
        let fit = bhmm()
            .args(["fit", "--input", path_arg(&data), "--nstates", "2"])
            .output()
            .unwrap();
        assert!(fit.status.success());
        let doc = stdout_json(&fit.stdout);
        assert!(doc["log_likelihood"].as_f64().unwrap().is_finite());
        let model = dir.path().join("fit.json");
        std::fs::write(&model, &fit.stdout).unwrap();

        bhmm()
            .args(["sample", "--input", path_arg(&data), "--nstates", "2", "--nsamples", "2"])
            .args(["--steps", "10", "--initial-model", path_arg(&model)])
            .assert()
            .success();
    }
}

// ============================================================================
// errors and exit codes
// ============================================================================

mod errors {
    use super::*;

    #[test]
    fn empty_observations_exit_11() {
        let dir = TempDir::new().unwrap();
        let data = write(&dir, "empty.json", "[]");
        bhmm()
            .args(["sample", "--input", path_arg(&data), "--nstates", "2"])
            .assert()
            .code(11)
            .stderr(predicate::str::contains("no trajectories"));
    }

    #[test]
    fn empty_trajectory_exit_11() {
        let dir = TempDir::new().unwrap();
        let data = write(&dir, "obs.json", "[[1.0, 2.0], []]");
        bhmm()
            .args(["sample", "--input", path_arg(&data), "--nstates", "2"])
            .assert()
            .code(11);
    }

    #[test]
    fn missing_input_exit_21() {
        bhmm()
            .args(["sample", "--input", "/nonexistent/bhmm/obs.json", "--nstates", "2"])
            .assert()
            .code(21);
    }

    #[test]
    fn invalid_config_value_exit_10() {
        let dir = TempDir::new().unwrap();
        let data = write(&dir, "obs.json", "[[1.0, 2.0, 1.5]]");
        bhmm()
            .args(["sample", "--input", path_arg(&data), "--nstates", "0"])
            .assert()
            .code(10);
    }

    #[test]
    fn zero_thinning_rejected() {
        let dir = TempDir::new().unwrap();
        let data = generate_into(&dir, &[]);
        bhmm()
            .args(["sample", "--input", path_arg(&data), "--nstates", "2", "--nthin", "0"])
            .assert()
            .code(11);
    }

    #[test]
    fn unknown_flag_exit_10() {
        bhmm()
            .args(["sample", "--bogus"])
            .assert()
            .code(10)
            .stderr(predicate::str::contains("error"));
    }

    #[test]
    fn conflicting_reversibility_flags() {
        bhmm()
            .args(["sample", "--input", "x.json", "--reversible", "--non-reversible"])
            .assert()
            .code(10);
    }
}

// ============================================================================
// help / version
// ============================================================================

mod info {
    use super::*;

    #[test]
    fn help_lists_commands() {
        bhmm()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("sample"))
            .stdout(predicate::str::contains("generate"));
    }

    #[test]
    fn version_is_json() {
        let output = bhmm().arg("version").output().unwrap();
        assert!(output.status.success());
        let doc = stdout_json(&output.stdout);
        assert_eq!(doc["bhmm_version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn jsonl_logs_go_to_stderr() {
        let output = bhmm().arg("version").output().unwrap();
        let stderr = String::from_utf8_lossy(&output.stderr);
        let first = stderr.lines().next().expect("at least one log line");
        let record: serde_json::Value = serde_json::from_str(first).unwrap();
        assert_eq!(record["event"], "run.started");
        assert_eq!(record["command"], "version");
    }
}
