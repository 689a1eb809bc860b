//! Python subprocess harness for validating generated code.
//!
//! The [`Executor`] trait decouples the phase loop from the Python backend.
//! Tests use scripted executors that return predetermined outcomes without
//! spawning processes.

use std::fs;
use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context as _, Result};
use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::core::types::{Diagnostic, DiagnosticKind, Validation};
use crate::io::process::run_command_with_timeout;

static DEF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("def regex should be valid")
});

/// Accumulated source shared across phases.
///
/// Code accepted by the code phase is extended here so the test phase runs
/// against the same definitions without re-import.
#[derive(Debug, Clone, Default)]
pub struct Context {
    source: String,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a snippet to the shared source. Append-only.
    pub fn extend(&mut self, code: &str) {
        if !self.source.is_empty() {
            self.source.push_str("\n\n");
        }
        self.source.push_str(code.trim_end());
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Parameters for one harness execution.
#[derive(Debug, Clone)]
pub struct ExecRequest<'a> {
    /// Previously accepted source loaded before the candidate.
    pub context: &'a str,
    /// The snippet under validation.
    pub candidate: &'a str,
    /// Maximum time to wait for the harness process.
    pub timeout: Duration,
    /// Truncate captured harness output beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Abstraction over code-validation backends.
pub trait Executor {
    /// Load the candidate on top of the shared context and invoke its entry
    /// point with zero arguments.
    ///
    /// Code-level failures (no entry point, load error, runtime exception,
    /// timeout) are returned as [`Validation::Fail`]; `Err` is reserved for
    /// infrastructure problems such as an unwritable temp directory.
    fn exec(&self, request: &ExecRequest<'_>) -> Result<Validation>;
}

/// Find the entry point of a snippet: the last top-level `def`.
///
/// The prompt contract requires the function under test to be the last one
/// defined and to take no required arguments.
pub fn entry_point(code: &str) -> Option<&str> {
    DEF_RE
        .captures_iter(code)
        .last()
        .map(|caps| caps.get(1).expect("group 1 always present").as_str())
}

/// Executor that runs a `python3` harness in a temp directory.
pub struct PythonExecutor {
    python: String,
}

impl PythonExecutor {
    pub fn new(python: &str) -> Self {
        Self {
            python: python.to_string(),
        }
    }
}

impl Executor for PythonExecutor {
    #[instrument(skip_all, fields(timeout_secs = request.timeout.as_secs()))]
    fn exec(&self, request: &ExecRequest<'_>) -> Result<Validation> {
        let Some(entry) = entry_point(request.candidate) else {
            warn!("candidate defines no top-level function");
            return Ok(Validation::fail(Diagnostic::no_entry_point()));
        };
        debug!(entry, "invoking entry point");

        let harness = build_harness(request.context, request.candidate, entry);
        let dir = tempfile::tempdir().context("create harness dir")?;
        let harness_path = dir.path().join("harness.py");
        fs::write(&harness_path, harness)
            .with_context(|| format!("write {}", harness_path.display()))?;

        let mut cmd = Command::new(&self.python);
        cmd.arg(&harness_path);
        let output = run_command_with_timeout(cmd, request.timeout, request.output_limit_bytes)
            .context("run python harness")?;

        if output.timed_out {
            return Ok(Validation::fail(Diagnostic::new(
                DiagnosticKind::TimedOut,
                format!("harness exceeded its {:?} timeout", request.timeout),
                output.combined(),
            )));
        }
        if !output.status.success() {
            return Ok(Validation::fail(Diagnostic::new(
                DiagnosticKind::ExecFailed,
                format!(
                    "{} exited with status {:?} while running {entry}()",
                    self.python,
                    output.status.code()
                ),
                output.combined(),
            )));
        }

        Ok(Validation::pass(output.stdout.trim()))
    }
}

/// Assemble the harness source: shared context, candidate, then a
/// zero-argument invocation of the entry point printing its result.
fn build_harness(context: &str, candidate: &str, entry: &str) -> String {
    let mut harness = String::new();
    if !context.is_empty() {
        harness.push_str(context.trim_end());
        harness.push_str("\n\n");
    }
    harness.push_str(candidate.trim_end());
    harness.push_str(&format!(
        "\n\nif __name__ == \"__main__\":\n    _result = {entry}()\n    print(_result)\n"
    ));
    harness
}
