//! Orchestration for one full run: code phase, test phase, artifact write.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, instrument};

use crate::core::prompt::{PromptEngine, TaskPrompt};
use crate::core::types::{Sampling, Validation};
use crate::io::artifact::write_artifact;
use crate::io::llm::CompletionClient;
use crate::io::pytest::TestRunner;
use crate::io::python::{Context, ExecRequest, Executor};
use crate::phase::{PhaseConfig, PhaseOutcome, run_phase};

/// Parameters for one run, resolved from config and CLI variant.
#[derive(Debug, Clone)]
pub struct RunRequest<'a> {
    /// The user's natural-language instruction.
    pub instruction: &'a str,
    /// Attempt budget for the code phase.
    pub code_attempts: u32,
    /// Attempt budget for the test phase.
    pub test_attempts: u32,
    /// Sampling for the code phase.
    pub code_sampling: Sampling,
    /// Sampling for the test phase (escalating in the stream variant).
    pub test_sampling: Sampling,
    /// Timeout for one harness execution.
    pub exec_timeout: Duration,
    /// Truncate captured subprocess output beyond this many bytes.
    pub output_limit_bytes: usize,
    /// Where to write the artifact.
    pub artifact_path: PathBuf,
}

/// Per-phase outcomes of a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub code: PhaseOutcome,
    /// `None` when the code phase never extracted any code.
    pub test: Option<PhaseOutcome>,
    pub artifact_path: PathBuf,
}

/// Drive both phases against one shared execution context, then write the
/// artifact.
///
/// The artifact is written regardless of phase outcomes: exhaustion leaves
/// the last extracted (possibly invalid) code in place rather than aborting.
/// When a `runner` is supplied, the test phase additionally validates the
/// on-disk artifact with it; the artifact is refreshed before each runner
/// invocation so the runner always sees the current candidate.
#[instrument(skip_all, fields(artifact = %request.artifact_path.display()))]
pub fn run<C, E, R>(
    request: &RunRequest<'_>,
    client: &C,
    executor: &E,
    runner: Option<&R>,
) -> Result<RunSummary>
where
    C: CompletionClient + ?Sized,
    E: Executor,
    R: TestRunner,
{
    let engine = PromptEngine::new();
    let mut context = Context::new();
    let mut prompt = TaskPrompt::new(request.instruction);

    let code_phase = run_phase(
        client,
        &engine,
        &mut prompt,
        |p| engine.render_code(p),
        |candidate| {
            executor.exec(&ExecRequest {
                context: context.source(),
                candidate,
                timeout: request.exec_timeout,
                output_limit_bytes: request.output_limit_bytes,
            })
        },
        &PhaseConfig {
            max_attempts: request.code_attempts,
            sampling: request.code_sampling,
        },
    )?;

    let code = code_phase.code.clone();
    if let Some(code_text) = code.as_deref() {
        // The test phase runs against the same definitions, even when the
        // code phase exhausted its budget (best effort).
        context.extend(code_text);
    }

    let test_phase = match code.as_deref() {
        None => {
            info!("no code extracted; skipping test phase");
            None
        }
        Some(code_text) => {
            let outcome = run_phase(
                client,
                &engine,
                &mut prompt,
                |p| engine.render_test(p, code_text),
                |candidate| {
                    let validation = executor.exec(&ExecRequest {
                        context: context.source(),
                        candidate,
                        timeout: request.exec_timeout,
                        output_limit_bytes: request.output_limit_bytes,
                    })?;
                    let value = match validation {
                        Validation::Pass { value } => value,
                        fail => return Ok(fail),
                    };
                    match runner {
                        None => Ok(Validation::pass(value)),
                        Some(runner) => {
                            // The runner validates the on-disk artifact.
                            write_artifact(
                                &request.artifact_path,
                                Some(code_text),
                                Some(candidate),
                            )?;
                            runner.run(&request.artifact_path)
                        }
                    }
                },
                &PhaseConfig {
                    max_attempts: request.test_attempts,
                    sampling: request.test_sampling,
                },
            )?;
            Some(outcome)
        }
    };

    let test_code = test_phase.as_ref().and_then(|phase| phase.code.clone());

    println!("### code ###");
    println!("{}", code.as_deref().unwrap_or_default());
    println!("### unit test ###");
    println!("{}", test_code.as_deref().unwrap_or_default());
    write_artifact(&request.artifact_path, code.as_deref(), test_code.as_deref())?;

    Ok(RunSummary {
        code: code_phase,
        test: test_phase,
        artifact_path: request.artifact_path.clone(),
    })
}
