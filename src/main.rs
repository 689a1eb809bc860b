//! CLI for the generate-validate-repair loop.
//!
//! Reads the instruction from the `PROMPT` environment variable, drives the
//! code and test phases against an OpenAI-compatible completion service, and
//! writes the final `generated.py` artifact best-effort. Phase exhaustion is
//! reported but is not a process failure.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use codeloop::core::types::Sampling;
use codeloop::io::config::{LoopConfig, load_config};
use codeloop::io::llm::OpenAiClient;
use codeloop::io::pytest::PytestRunner;
use codeloop::io::python::PythonExecutor;
use codeloop::phase::PhaseStop;
use codeloop::run::{RunRequest, RunSummary};
use codeloop::{logging, run};

#[derive(Parser)]
#[command(
    name = "codeloop",
    version,
    about = "Generate, validate, and repair Python code with an LLM"
)]
struct Cli {
    /// Path to the TOML config file (missing file uses defaults).
    #[arg(long, default_value = "codeloop.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Buffered completions; validate code and tests via the harness only.
    Run,
    /// Streamed completions printed as they arrive, plus a pytest pass over
    /// the artifact, with temperature escalation on repeated test failures.
    Stream,
}

fn main() {
    logging::init();
    if let Err(err) = try_main() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;
    let instruction = std::env::var("PROMPT").context("PROMPT not set")?;
    let executor = PythonExecutor::new(&cfg.python);

    let summary = match cli.command {
        Command::Run => {
            let client =
                OpenAiClient::from_env(&cfg.api_base, &cfg.model, cfg.request_timeout(), false)?;
            let request = RunRequest {
                instruction: &instruction,
                code_attempts: cfg.code_attempts,
                test_attempts: cfg.test_attempts,
                code_sampling: Sampling::fixed(cfg.temperature),
                test_sampling: Sampling::fixed(cfg.temperature),
                exec_timeout: cfg.exec_timeout(),
                output_limit_bytes: cfg.output_limit_bytes,
                artifact_path: PathBuf::from(&cfg.artifact_path),
            };
            run::run(&request, &client, &executor, None::<&PytestRunner>)?
        }
        Command::Stream => {
            let model = model_override(&cfg);
            let client =
                OpenAiClient::from_env(&cfg.api_base, &model, cfg.request_timeout(), true)?;
            let runner =
                PytestRunner::new(&cfg.python, cfg.runner_timeout(), cfg.output_limit_bytes);
            let request = RunRequest {
                instruction: &instruction,
                code_attempts: cfg.code_attempts,
                test_attempts: cfg.stream_test_attempts,
                code_sampling: Sampling::fixed(cfg.stream_temperature),
                test_sampling: Sampling::escalating(
                    cfg.stream_temperature,
                    cfg.temperature_escalation,
                ),
                exec_timeout: cfg.exec_timeout(),
                output_limit_bytes: cfg.output_limit_bytes,
                artifact_path: PathBuf::from(&cfg.artifact_path),
            };
            run::run(&request, &client, &executor, Some(&runner))?
        }
    };

    report(&summary);
    Ok(())
}

/// `MODEL` overrides the configured model for the stream variant.
fn model_override(cfg: &LoopConfig) -> String {
    std::env::var("MODEL").unwrap_or_else(|_| cfg.model.clone())
}

fn report(summary: &RunSummary) {
    report_phase("code", Some(&summary.code.stop), summary.code.attempts);
    match &summary.test {
        Some(test) => report_phase("test", Some(&test.stop), test.attempts),
        None => report_phase("test", None, 0),
    }
    println!("wrote {}", summary.artifact_path.display());
}

fn report_phase(name: &str, stop: Option<&PhaseStop>, attempts: u32) {
    match stop {
        Some(PhaseStop::Success) => {
            println!("{name} phase succeeded after {attempts} attempt(s)");
        }
        Some(PhaseStop::Exhausted { last }) => {
            println!("{name} phase exhausted its budget; last failure: {}", last.message);
        }
        None => println!("{name} phase skipped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run() {
        let cli = Cli::parse_from(["codeloop", "run"]);
        assert!(matches!(cli.command, Command::Run));
        assert_eq!(cli.config, PathBuf::from("codeloop.toml"));
    }

    #[test]
    fn parse_stream_with_config() {
        let cli = Cli::parse_from(["codeloop", "--config", "custom.toml", "stream"]);
        assert!(matches!(cli.command, Command::Stream));
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
    }
}
