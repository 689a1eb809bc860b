//! LLM-backed generate-validate-repair loop for Python snippets.
//!
//! This crate asks a chat-completion service to generate a Python function
//! (and later a unit test for it) from a natural-language instruction,
//! validates each candidate by executing it as a subprocess, and retries with
//! an error-augmented prompt until the candidate passes or the attempt budget
//! runs out. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (code extraction, prompt growth,
//!   validation types). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (HTTP completion client, Python
//!   subprocess harness, pytest runner, artifact writes). Isolated behind
//!   traits to enable scripted doubles in tests.
//!
//! Orchestration modules ([`phase`], [`run`]) coordinate core logic with I/O
//! to implement the CLI subcommands.

pub mod core;
pub mod io;
pub mod logging;
pub mod phase;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
