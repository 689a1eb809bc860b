//! Prompt templates and the append-only task prompt.
//!
//! The task prompt starts as the user's instruction and grows by one repair
//! block per failed attempt; it is never rewritten or shrunk, so every retry
//! carries the full failure history forward.

use anyhow::Result;
use minijinja::{Environment, context};

use crate::core::types::Diagnostic;

const CODE_TEMPLATE: &str = include_str!("prompts/code.md");
const TEST_TEMPLATE: &str = include_str!("prompts/test.md");
const REPAIR_TEMPLATE: &str = include_str!("prompts/repair.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("code", CODE_TEMPLATE)
            .expect("code template should be valid");
        env.add_template("test", TEST_TEMPLATE)
            .expect("test template should be valid");
        env.add_template("repair", REPAIR_TEMPLATE)
            .expect("repair template should be valid");
        Self { env }
    }

    /// Render the code-phase request for the current task prompt.
    pub fn render_code(&self, prompt: &TaskPrompt) -> Result<String> {
        let template = self.env.get_template("code")?;
        let rendered = template.render(context! {
            prompt => prompt.as_str(),
        })?;
        Ok(rendered)
    }

    /// Render the test-phase request for the current task prompt and accepted code.
    pub fn render_test(&self, prompt: &TaskPrompt, code: &str) -> Result<String> {
        let template = self.env.get_template("test")?;
        let rendered = template.render(context! {
            prompt => prompt.as_str(),
            code => code,
        })?;
        Ok(rendered)
    }

    /// Render the remediation block appended to the task prompt after a failure.
    pub fn render_repair(&self, code: Option<&str>, diagnostic: &Diagnostic) -> Result<String> {
        let template = self.env.get_template("repair")?;
        let rendered = template.render(context! {
            code => code.unwrap_or("<no code block was produced>"),
            diagnostic => diagnostic.to_string(),
        })?;
        Ok(rendered)
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// The growing natural-language instruction for one run.
#[derive(Debug, Clone)]
pub struct TaskPrompt {
    text: String,
    failures: u32,
}

impl TaskPrompt {
    pub fn new(instruction: &str) -> Self {
        Self {
            text: instruction.to_string(),
            failures: 0,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of repair blocks appended so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Append a rendered repair block. The existing text is never modified.
    pub fn append_failure(&mut self, block: &str) {
        self.text.push_str("\n\n");
        self.text.push_str(block.trim_end());
        self.failures += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Diagnostic, DiagnosticKind};

    #[test]
    fn code_template_embeds_instruction() {
        let engine = PromptEngine::new();
        let prompt = TaskPrompt::new("write a function that returns 42");
        let rendered = engine.render_code(&prompt).expect("render");
        assert!(rendered.contains("coding assistant"));
        assert!(rendered.contains("write a function that returns 42"));
    }

    #[test]
    fn test_template_embeds_code_and_instruction() {
        let engine = PromptEngine::new();
        let prompt = TaskPrompt::new("the instruction");
        let rendered = engine
            .render_test(&prompt, "def answer():\n    return 42")
            .expect("render");
        assert!(rendered.contains("pytest"));
        assert!(rendered.contains("def answer():"));
        assert!(rendered.contains("the instruction"));
    }

    /// Verifies prompt growth is monotonic and attempt-count-proportional:
    /// after n failures the prompt is the original instruction as a prefix
    /// plus exactly n repair blocks, each carrying the failing code and a
    /// non-empty diagnostic.
    #[test]
    fn prompt_grows_by_one_repair_block_per_failure() {
        let engine = PromptEngine::new();
        let mut prompt = TaskPrompt::new("original instruction");

        for n in 1..=3u32 {
            let diag = Diagnostic::new(
                DiagnosticKind::ExecFailed,
                format!("failure {n}"),
                "Traceback",
            );
            let block = engine
                .render_repair(Some(&format!("bad_code_{n}")), &diag)
                .expect("render repair");
            let before = prompt.as_str().to_string();
            prompt.append_failure(&block);

            assert!(prompt.as_str().starts_with("original instruction"));
            assert!(prompt.as_str().starts_with(&before), "append-only");
            assert_eq!(prompt.failures(), n);
            assert!(prompt.as_str().contains(&format!("bad_code_{n}")));
            assert!(prompt.as_str().contains(&format!("failure {n}")));
        }

        let repair_count = prompt.as_str().matches("resulted in this failure").count();
        assert_eq!(repair_count, 3);
    }

    #[test]
    fn repair_block_without_code_uses_placeholder() {
        let engine = PromptEngine::new();
        let block = engine
            .render_repair(None, &Diagnostic::no_code_block())
            .expect("render repair");
        assert!(block.contains("<no code block was produced>"));
        assert!(block.contains("no code block"));
    }
}
