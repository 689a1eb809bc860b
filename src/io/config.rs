//! Loop configuration stored in `codeloop.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Loop configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values; a missing file is
/// equivalent to the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoopConfig {
    /// Model identifier sent to the completion service.
    pub model: String,

    /// Base URL of the OpenAI-compatible API.
    pub api_base: String,

    /// Attempt budget for the code-generation phase.
    pub code_attempts: u32,

    /// Attempt budget for the test-generation phase (`run` subcommand).
    pub test_attempts: u32,

    /// Attempt budget for the test-generation phase (`stream` subcommand).
    pub stream_test_attempts: u32,

    /// Sampling temperature for buffered completions.
    pub temperature: f64,

    /// Starting sampling temperature for streamed completions.
    pub stream_temperature: f64,

    /// Multiplier applied to the temperature after each failed streamed
    /// test-generation attempt. 1.0 disables escalation.
    pub temperature_escalation: f64,

    /// Timeout for a single completion request, in seconds.
    pub request_timeout_secs: u64,

    /// Timeout for one harness execution, in seconds.
    pub exec_timeout_secs: u64,

    /// Timeout for one external test-runner invocation, in seconds.
    pub runner_timeout_secs: u64,

    /// Truncate captured subprocess output beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Python interpreter used for the harness and the test runner.
    pub python: String,

    /// Path of the output artifact, overwritten on each run.
    pub artifact_path: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            code_attempts: 4,
            test_attempts: 4,
            stream_test_attempts: 10,
            temperature: 0.0,
            stream_temperature: 0.01,
            temperature_escalation: 2.0,
            request_timeout_secs: 300,
            exec_timeout_secs: 60,
            runner_timeout_secs: 120,
            output_limit_bytes: 100_000,
            python: "python3".to_string(),
            artifact_path: "generated.py".to_string(),
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow!("model must be non-empty"));
        }
        if self.code_attempts == 0 || self.test_attempts == 0 || self.stream_test_attempts == 0 {
            return Err(anyhow!("attempt budgets must be > 0"));
        }
        if self.request_timeout_secs == 0
            || self.exec_timeout_secs == 0
            || self.runner_timeout_secs == 0
        {
            return Err(anyhow!("timeouts must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.temperature_escalation < 1.0 {
            return Err(anyhow!("temperature_escalation must be >= 1.0"));
        }
        if self.python.trim().is_empty() {
            return Err(anyhow!("python must be non-empty"));
        }
        if self.artifact_path.trim().is_empty() {
            return Err(anyhow!("artifact_path must be non-empty"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }

    pub fn runner_timeout(&self) -> Duration {
        Duration::from_secs(self.runner_timeout_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LoopConfig::default()`.
pub fn load_config(path: &Path) -> Result<LoopConfig> {
    if !path.exists() {
        let cfg = LoopConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LoopConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &LoopConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
