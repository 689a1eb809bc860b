//! The generate-validate-repair loop for one phase.
//!
//! A phase drives either code generation or test generation through bounded
//! retries, turning each failure into additional prompt context for the next
//! attempt. All loop state (attempt index, sampling temperature) is explicit
//! and threaded through; there are no ambient counters.

use anyhow::{Result, anyhow, bail};
use tracing::{info, instrument, warn};

use crate::core::extract::extract_code;
use crate::core::prompt::{PromptEngine, TaskPrompt};
use crate::core::types::{Diagnostic, Sampling, Validation};
use crate::io::llm::{CompletionClient, CompletionRequest};

/// Configuration for one phase.
#[derive(Debug, Clone)]
pub struct PhaseConfig {
    /// Maximum number of request/validate cycles before giving up.
    pub max_attempts: u32,
    /// Initial sampling state; escalates after each failed attempt.
    pub sampling: Sampling,
}

/// Why a phase stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseStop {
    /// An attempt passed validation.
    Success,
    /// The attempt budget ran out; `last` is the final failure.
    Exhausted { last: Diagnostic },
}

/// Result of driving one phase to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseOutcome {
    /// The last extracted code, kept even on exhaustion for the best-effort
    /// artifact write.
    pub code: Option<String>,
    /// Validator-produced result value, present only on success.
    pub value: Option<String>,
    /// Completion requests issued.
    pub attempts: u32,
    pub stop: PhaseStop,
}

impl PhaseOutcome {
    pub fn succeeded(&self) -> bool {
        self.stop == PhaseStop::Success
    }
}

/// Drive one phase through bounded retries.
///
/// Each attempt renders the current task prompt with `render`, requests a
/// completion, extracts the first fenced code block, and validates it with
/// `validate`. A failed attempt appends a repair block (failing code plus
/// diagnostic) to the task prompt and escalates the sampling temperature
/// before the next attempt. The loop stops immediately on the first success
/// and issues at most `max_attempts` completion requests.
///
/// Recoverable failures never abort the phase; only infrastructure errors
/// (client transport, spawn failures) propagate as `Err`.
#[instrument(skip_all, fields(max_attempts = config.max_attempts))]
pub fn run_phase<C, R, V>(
    client: &C,
    engine: &PromptEngine,
    prompt: &mut TaskPrompt,
    render: R,
    mut validate: V,
    config: &PhaseConfig,
) -> Result<PhaseOutcome>
where
    C: CompletionClient + ?Sized,
    R: Fn(&TaskPrompt) -> Result<String>,
    V: FnMut(&str) -> Result<Validation>,
{
    if config.max_attempts == 0 {
        bail!("max_attempts must be > 0");
    }

    let mut sampling = config.sampling;
    let mut last_code: Option<String> = None;
    let mut last_diagnostic: Option<Diagnostic> = None;

    for attempt in 1..=config.max_attempts {
        println!("{}", prompt.as_str());
        let rendered = render(prompt)?;
        info!(
            attempt,
            temperature = sampling.temperature,
            "requesting completion"
        );
        let response = client.complete(&CompletionRequest {
            prompt: rendered,
            temperature: sampling.temperature,
        })?;

        let (code, diagnostic) = match extract_code(&response) {
            None => (None, Diagnostic::no_code_block()),
            Some(code) => {
                println!("{code}");
                match validate(&code)? {
                    Validation::Pass { value } => {
                        println!("program compiles and runs");
                        return Ok(PhaseOutcome {
                            code: Some(code),
                            value: Some(value),
                            attempts: attempt,
                            stop: PhaseStop::Success,
                        });
                    }
                    Validation::Fail(diagnostic) => (Some(code), diagnostic),
                }
            }
        };

        println!("{diagnostic}");
        let repair = engine.render_repair(code.as_deref(), &diagnostic)?;
        prompt.append_failure(&repair);
        sampling.escalate();
        if code.is_some() {
            last_code = code;
        }
        last_diagnostic = Some(diagnostic);
    }

    warn!(failures = prompt.failures(), "attempt budget exhausted");
    let last = last_diagnostic.ok_or_else(|| anyhow!("phase ended without a diagnostic"))?;
    Ok(PhaseOutcome {
        code: last_code,
        value: None,
        attempts: config.max_attempts,
        stop: PhaseStop::Exhausted { last },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DiagnosticKind, Sampling};
    use crate::test_support::{ScriptedClient, fenced};

    fn config(max_attempts: u32) -> PhaseConfig {
        PhaseConfig {
            max_attempts,
            sampling: Sampling::fixed(0.0),
        }
    }

    fn exec_failure(message: &str) -> Validation {
        Validation::fail(Diagnostic::new(
            DiagnosticKind::ExecFailed,
            message,
            "Traceback (most recent call last): ...",
        ))
    }

    /// Verifies the loop issues at most `max_attempts` requests and
    /// terminates when every attempt fails.
    #[test]
    fn exhausts_budget_for_always_failing_validator() {
        let client = ScriptedClient::new(vec![
            fenced("bad = 1\ndef f():\n    pass"),
            fenced("bad = 2\ndef f():\n    pass"),
            fenced("bad = 3\ndef f():\n    pass"),
        ]);
        let engine = PromptEngine::new();
        let mut prompt = TaskPrompt::new("instruction");

        let outcome = run_phase(
            &client,
            &engine,
            &mut prompt,
            |p| engine.render_code(p),
            |_| Ok(exec_failure("always fails")),
            &config(3),
        )
        .expect("phase");

        assert_eq!(client.requests(), 3);
        assert_eq!(outcome.attempts, 3);
        assert!(!outcome.succeeded());
        let PhaseStop::Exhausted { last } = outcome.stop else {
            panic!("expected exhaustion");
        };
        assert_eq!(last.kind, DiagnosticKind::ExecFailed);
        // Last extracted code is kept for the best-effort artifact write.
        assert!(outcome.code.expect("code").contains("bad = 3"));
        assert_eq!(prompt.failures(), 3);
    }

    /// Verifies the loop stops immediately on the first success and issues
    /// no further requests.
    #[test]
    fn stops_on_first_success() {
        let client = ScriptedClient::new(vec![
            fenced("def answer():\n    return 42"),
            fenced("never requested"),
        ]);
        let engine = PromptEngine::new();
        let mut prompt = TaskPrompt::new("instruction");

        let outcome = run_phase(
            &client,
            &engine,
            &mut prompt,
            |p| engine.render_code(p),
            |_| Ok(Validation::pass("42")),
            &config(4),
        )
        .expect("phase");

        assert_eq!(client.requests(), 1);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.succeeded());
        assert_eq!(outcome.value.as_deref(), Some("42"));
        assert_eq!(prompt.failures(), 0);
    }

    /// Scenario: first response fails to load, second is valid; the loop
    /// succeeds on attempt 2 having issued exactly 2 requests, and the second
    /// request carries the first failure's diagnostic.
    #[test]
    fn recovers_after_failure_with_grown_prompt() {
        let client = ScriptedClient::new(vec![
            fenced("def broken(:\n    pass"),
            fenced("def answer():\n    return 42"),
        ]);
        let engine = PromptEngine::new();
        let mut prompt = TaskPrompt::new("instruction");
        let mut calls = 0u32;

        let outcome = run_phase(
            &client,
            &engine,
            &mut prompt,
            |p| engine.render_code(p),
            |_| {
                calls += 1;
                if calls == 1 {
                    Ok(exec_failure("SyntaxError: invalid syntax"))
                } else {
                    Ok(Validation::pass("42"))
                }
            },
            &config(4),
        )
        .expect("phase");

        assert!(outcome.succeeded());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(client.requests(), 2);
        let prompts = client.prompts.borrow();
        assert!(!prompts[0].contains("SyntaxError"));
        assert!(prompts[1].contains("SyntaxError: invalid syntax"));
        assert!(prompts[1].contains("def broken(:"));
    }

    /// A response without a fenced block is a distinct failure kind and never
    /// reaches the validator.
    #[test]
    fn missing_code_block_skips_validation() {
        let client = ScriptedClient::new(vec![
            "Sorry, here is prose instead of code.".to_string(),
            fenced("def answer():\n    return 42"),
        ]);
        let engine = PromptEngine::new();
        let mut prompt = TaskPrompt::new("instruction");
        let mut validated = 0u32;

        let outcome = run_phase(
            &client,
            &engine,
            &mut prompt,
            |p| engine.render_code(p),
            |_| {
                validated += 1;
                Ok(Validation::pass("42"))
            },
            &config(4),
        )
        .expect("phase");

        assert!(outcome.succeeded());
        assert_eq!(validated, 1, "prose attempt must not reach the validator");
        assert!(client.prompts.borrow()[1].contains("no code block"));
    }

    /// Verifies sampling escalation doubles the temperature between failed
    /// attempts when configured.
    #[test]
    fn escalates_temperature_across_failures() {
        let client = ScriptedClient::new(vec![
            fenced("def f():\n    pass"),
            fenced("def f():\n    pass"),
            fenced("def f():\n    pass"),
        ]);
        let engine = PromptEngine::new();
        let mut prompt = TaskPrompt::new("instruction");

        let config = PhaseConfig {
            max_attempts: 3,
            sampling: Sampling::escalating(0.01, 2.0),
        };
        run_phase(
            &client,
            &engine,
            &mut prompt,
            |p| engine.render_code(p),
            |_| Ok(exec_failure("still failing")),
            &config,
        )
        .expect("phase");

        assert_eq!(*client.temperatures.borrow(), vec![0.01, 0.02, 0.04]);
    }

    #[test]
    fn zero_budget_is_an_error() {
        let client = ScriptedClient::new(Vec::<String>::new());
        let engine = PromptEngine::new();
        let mut prompt = TaskPrompt::new("instruction");

        let err = run_phase(
            &client,
            &engine,
            &mut prompt,
            |p| engine.render_code(p),
            |_| Ok(Validation::pass("")),
            &config(0),
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }
}
