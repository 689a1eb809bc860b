//! Shared deterministic types for the validation loop.
//!
//! These types define stable contracts between the phase loop and the
//! validation backends. They must remain free of I/O and deterministic.

use std::fmt;

/// Category of a failed validation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// The completion contained no fenced code block.
    NoCodeBlock,
    /// The extracted code defines no top-level function to invoke.
    NoEntryPoint,
    /// The harness process failed (load error or runtime exception).
    ExecFailed,
    /// The external test runner reported a non-zero exit status.
    RunnerFailed,
    /// A validation subprocess exceeded its timeout.
    TimedOut,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiagnosticKind::NoCodeBlock => "no code block",
            DiagnosticKind::NoEntryPoint => "no entry point",
            DiagnosticKind::ExecFailed => "execution failure",
            DiagnosticKind::RunnerFailed => "test runner failure",
            DiagnosticKind::TimedOut => "timeout",
        };
        f.write_str(label)
    }
}

/// Why an attempt failed, with enough detail to drive a repair prompt.
///
/// `message` is a one-line summary; `detail` carries the full trace or
/// captured process output (may be empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: detail.into(),
        }
    }

    pub fn no_code_block() -> Self {
        Self::new(
            DiagnosticKind::NoCodeBlock,
            "the response contained no ```python fenced code block",
            "",
        )
    }

    pub fn no_entry_point() -> Self {
        Self::new(
            DiagnosticKind::NoEntryPoint,
            "the code defines no top-level function to invoke",
            "",
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if !self.detail.is_empty() {
            write!(f, "\n{}", self.detail)?;
        }
        Ok(())
    }
}

/// Outcome of validating one extracted candidate.
///
/// `Fail` is a recoverable, re-promptable result; infrastructure problems
/// (spawn failures, unwritable temp files) surface as `anyhow::Error` from the
/// validator instead and abort the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The candidate loaded and its entry point ran; `value` is the captured result.
    Pass { value: String },
    /// The candidate failed; the diagnostic feeds the next prompt.
    Fail(Diagnostic),
}

impl Validation {
    pub fn pass(value: impl Into<String>) -> Self {
        Validation::Pass {
            value: value.into(),
        }
    }

    pub fn fail(diagnostic: Diagnostic) -> Self {
        Validation::Fail(diagnostic)
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Validation::Pass { .. })
    }
}

/// Sampling state threaded through a phase.
///
/// `escalation` multiplies the temperature after each failed attempt; a factor
/// of 1.0 keeps it fixed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f64,
    pub escalation: f64,
}

impl Sampling {
    pub fn fixed(temperature: f64) -> Self {
        Self {
            temperature,
            escalation: 1.0,
        }
    }

    pub fn escalating(temperature: f64, escalation: f64) -> Self {
        Self {
            temperature,
            escalation,
        }
    }

    /// Apply the escalation factor after a failed attempt.
    pub fn escalate(&mut self) {
        self.temperature *= self.escalation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display_includes_kind_and_detail() {
        let diag = Diagnostic::new(
            DiagnosticKind::ExecFailed,
            "python exited with status 1",
            "Traceback (most recent call last):\n  ...",
        );
        let rendered = diag.to_string();
        assert!(rendered.starts_with("execution failure: python exited with status 1"));
        assert!(rendered.contains("Traceback"));
    }

    #[test]
    fn diagnostic_display_omits_empty_detail() {
        let rendered = Diagnostic::no_code_block().to_string();
        assert!(!rendered.ends_with('\n'));
        assert_eq!(rendered.lines().count(), 1);
    }

    #[test]
    fn fixed_sampling_does_not_escalate() {
        let mut sampling = Sampling::fixed(0.5);
        sampling.escalate();
        assert_eq!(sampling.temperature, 0.5);
    }

    #[test]
    fn escalating_sampling_doubles() {
        let mut sampling = Sampling::escalating(0.01, 2.0);
        sampling.escalate();
        sampling.escalate();
        assert_eq!(sampling.temperature, 0.04);
    }
}
