// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for prompt rendering

use super::*;
use crate::task::TaskId;

fn task() -> Task {
    Task {
        id: TaskId::from("41"),
        title: "Fix the flaky login test".to_string(),
        body: "It fails every third run on CI.".to_string(),
        backend_ref: "acme/api#41".to_string(),
        error: None,
    }
}

#[test]
fn default_prompt_includes_task_fields() {
    let rendered = render_agent_prompt(None, &task()).unwrap();
    assert!(rendered.contains("Task 41: Fix the flaky login test"));
    assert!(rendered.contains("It fails every third run on CI."));
    assert!(rendered.contains("Do not push"));
}

#[test]
fn custom_template_overrides_default() {
    let rendered = render_agent_prompt(Some("{{ title }} ({{ id }})"), &task()).unwrap();
    assert_eq!(rendered, "Fix the flaky login test (41)");
}

#[test]
fn unknown_variables_render_empty() {
    // minijinja leaves undefined lookups empty rather than failing
    let rendered = render_agent_prompt(Some("a{{ missing }}b"), &task()).unwrap();
    assert_eq!(rendered, "ab");
}

#[test]
fn malformed_template_is_an_error() {
    let err = render_agent_prompt(Some("{% if %}"), &task()).unwrap_err();
    assert!(matches!(err, PromptError::Template(_)));
}
