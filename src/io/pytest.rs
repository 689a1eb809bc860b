//! External test-runner invocation against the on-disk artifact.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::types::{Diagnostic, DiagnosticKind, Validation};
use crate::io::process::run_command_with_timeout;

/// Abstraction over external test-runner backends.
pub trait TestRunner {
    /// Run the suite in the artifact file. A non-zero exit status is a
    /// [`Validation::Fail`] whose diagnostic carries the captured output.
    fn run(&self, artifact: &Path) -> Result<Validation>;
}

/// Runner that spawns `python -m pytest <artifact>`.
pub struct PytestRunner {
    python: String,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl PytestRunner {
    pub fn new(python: &str, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            python: python.to_string(),
            timeout,
            output_limit_bytes,
        }
    }
}

impl TestRunner for PytestRunner {
    #[instrument(skip_all, fields(artifact = %artifact.display(), timeout_secs = self.timeout.as_secs()))]
    fn run(&self, artifact: &Path) -> Result<Validation> {
        let mut cmd = Command::new(&self.python);
        cmd.arg("-m").arg("pytest").arg(artifact);
        let output = run_command_with_timeout(cmd, self.timeout, self.output_limit_bytes)
            .context("run pytest")?;

        println!("stdout: {}", output.stdout);
        println!("stderr: {}", output.stderr);

        if output.timed_out {
            return Ok(Validation::fail(Diagnostic::new(
                DiagnosticKind::TimedOut,
                format!("pytest exceeded its {:?} timeout", self.timeout),
                output.combined(),
            )));
        }
        if !output.status.success() {
            info!(exit_code = ?output.status.code(), "pytest reported failures");
            return Ok(Validation::fail(Diagnostic::new(
                DiagnosticKind::RunnerFailed,
                format!("pytest exited with status {:?}", output.status.code()),
                output.combined(),
            )));
        }

        Ok(Validation::pass(output.stdout.trim()))
    }
}
