// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent prompt rendering.

use minijinja::Environment;
use thiserror::Error;

use crate::task::Task;

/// Built-in prompt used when a project does not override it
pub const DEFAULT_PROMPT: &str = "\
You are working autonomously on the task below.

Task {{ id }}: {{ title }}

{{ body }}

Make the changes the task asks for and commit them with clear messages.
Do not push; the orchestrator publishes your branch when you are done.
";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("invalid prompt template: {0}")]
    Template(String),
}

/// Render the agent prompt for a task
pub fn render_agent_prompt(template: Option<&str>, task: &Task) -> Result<String, PromptError> {
    let source = template.unwrap_or(DEFAULT_PROMPT);
    let mut env = Environment::new();
    env.add_template("prompt", source)
        .map_err(|e| PromptError::Template(e.to_string()))?;
    let template = env
        .get_template("prompt")
        .map_err(|e| PromptError::Template(e.to_string()))?;
    template
        .render(minijinja::context! {
            id => task.id.0,
            title => task.title,
            body => task.body,
        })
        .map_err(|e| PromptError::Template(e.to_string()))
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
