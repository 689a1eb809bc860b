//! Test-only scripted doubles for the client, executor, and runner.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use crate::core::types::Validation;
use crate::io::llm::{CompletionClient, CompletionRequest};
use crate::io::pytest::TestRunner;
use crate::io::python::{ExecRequest, Executor};

/// Wrap a snippet in the fenced block the extractor expects.
pub fn fenced(code: &str) -> String {
    format!("Here is the code:\n```python\n{code}\n```\n")
}

/// Completion client that replays queued responses and records requests.
pub struct ScriptedClient {
    responses: RefCell<VecDeque<String>>,
    pub prompts: RefCell<Vec<String>>,
    pub temperatures: RefCell<Vec<f64>>,
}

impl ScriptedClient {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            prompts: RefCell::new(Vec::new()),
            temperatures: RefCell::new(Vec::new()),
        }
    }

    /// Number of completion requests issued so far.
    pub fn requests(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl CompletionClient for ScriptedClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.prompts.borrow_mut().push(request.prompt.clone());
        self.temperatures.borrow_mut().push(request.temperature);
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted responses left"))
    }
}

/// Executor that replays queued validation outcomes and records candidates.
pub struct ScriptedExecutor {
    outcomes: RefCell<VecDeque<Validation>>,
    pub candidates: RefCell<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new(outcomes: Vec<Validation>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into()),
            candidates: RefCell::new(Vec::new()),
        }
    }
}

impl Executor for ScriptedExecutor {
    fn exec(&self, request: &ExecRequest<'_>) -> Result<Validation> {
        self.candidates
            .borrow_mut()
            .push(request.candidate.to_string());
        self.outcomes
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted executor outcomes left"))
    }
}

/// Test runner that replays queued outcomes and records artifact paths.
pub struct ScriptedRunner {
    outcomes: RefCell<VecDeque<Validation>>,
    pub artifacts: RefCell<Vec<PathBuf>>,
}

impl ScriptedRunner {
    pub fn new(outcomes: Vec<Validation>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into()),
            artifacts: RefCell::new(Vec::new()),
        }
    }
}

impl TestRunner for ScriptedRunner {
    fn run(&self, artifact: &Path) -> Result<Validation> {
        self.artifacts.borrow_mut().push(artifact.to_path_buf());
        self.outcomes
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted runner outcomes left"))
    }
}
