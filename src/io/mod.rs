//! I/O helpers for the loop: HTTP client, subprocesses, config, artifact.

pub mod artifact;
pub mod config;
pub mod llm;
pub mod process;
pub mod pytest;
pub mod python;
