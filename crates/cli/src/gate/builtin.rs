// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shipped gate set, expressed as configuration rows.
//!
//! Registry order is policy merge order: hydration first (nothing moves
//! before the prompt is hydrated), then task binding, the custodiet
//! compliance counter, handover, and the two stop-quality gates.

use crate::state::GateStatus;

use super::{
    Countdown, GateCondition, GateConfig, GatePolicy, GateTransition, GateTrigger, ToolCategory,
    Verdict,
};

/// Enforcement mode for a toggleable gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateMode {
    #[default]
    Block,
    Warn,
    Off,
}

impl GateMode {
    /// Parse an env/flag value; unrecognized values fall back to block
    /// (fail-closed).
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "warn" => Self::Warn,
            "off" | "disabled" => Self::Off,
            _ => Self::Block,
        }
    }

    fn verdict(self) -> Verdict {
        match self {
            Self::Block => Verdict::Deny,
            Self::Warn => Verdict::Warn,
            Self::Off => Verdict::Allow,
        }
    }
}

/// Toggles and thresholds applied when building the gate set.
#[derive(Debug, Clone)]
pub struct GateModes {
    pub hydration: GateMode,
    pub task: GateMode,
    pub custodiet: GateMode,
    pub custodiet_threshold: u64,
    pub custodiet_start_before: u64,
}

impl Default for GateModes {
    fn default() -> Self {
        Self {
            hydration: GateMode::Block,
            task: GateMode::Block,
            custodiet: GateMode::Block,
            custodiet_threshold: 7,
            custodiet_start_before: 3,
        }
    }
}

/// Build the built-in gate set. Stop-class policies run critic, then
/// handover, then qa.
pub fn configs(modes: &GateModes) -> Vec<GateConfig> {
    vec![
        hydration(modes),
        task_required(modes),
        custodiet(modes),
        critic(),
        handover(),
        qa(),
    ]
}

/// Hydration gate: closed by the prompt handler when a prompt needs
/// hydration; opened by evidence the hydrator ran to completion. While
/// closed, mutating tools are blocked with a pointer at the payload file.
fn hydration(modes: &GateModes) -> GateConfig {
    let mut policies = Vec::new();
    if modes.hydration != GateMode::Off {
        policies.push(GatePolicy {
            condition: GateCondition {
                current_status: Some(GateStatus::Closed),
                hook_event: Some("PreToolUse"),
                excluded_tool_categories: &[ToolCategory::Read],
                custom_check: Some("hydration_blocks"),
                ..GateCondition::default()
            },
            verdict: modes.hydration.verdict(),
            custom_action: None,
            message_template: "Hydration required: context payload at {temp_path}.",
            context_template: Some(
                "This session has an unhydrated prompt. Read {temp_path} and spawn the \
                 prompt-hydrator sub-agent with that file before modifying state. \
                 Original prompt: {original_prompt}",
            ),
        });
    }
    GateConfig {
        name: "hydration",
        initial_status: GateStatus::Closed,
        countdown: None,
        triggers: vec![
            GateTrigger {
                condition: GateCondition {
                    hook_event: Some("SubagentStop"),
                    subagent_type_pattern: Some("hydrator"),
                    custom_check: Some("hydrator_result_valid"),
                    ..GateCondition::default()
                },
                transition: GateTransition {
                    target_status: Some(GateStatus::Open),
                    custom_action: Some("complete_hydration"),
                    ..GateTransition::default()
                },
            },
            GateTrigger {
                condition: GateCondition {
                    hook_event: Some("AfterAgent"),
                    custom_check: Some("response_has_hydration_result"),
                    ..GateCondition::default()
                },
                transition: GateTransition {
                    target_status: Some(GateStatus::Open),
                    custom_action: Some("complete_hydration"),
                    ..GateTransition::default()
                },
            },
        ],
        policies,
    }
}

/// Task gate: state-modifying tools require a bound task, with carve-outs
/// for framework temp paths and read-only shell commands (both inside the
/// custom check).
fn task_required(modes: &GateModes) -> GateConfig {
    let mut policies = Vec::new();
    if modes.task != GateMode::Off {
        policies.push(GatePolicy {
            condition: GateCondition {
                hook_event: Some("PreToolUse"),
                custom_check: Some("task_unbound_mutation"),
                ..GateCondition::default()
            },
            verdict: modes.task.verdict(),
            custom_action: None,
            message_template: "No task bound to this session.",
            context_template: Some(
                "State-modifying tools require a bound task. Claim or bind a task through \
                 the task manager, then retry {tool_name}.",
            ),
        });
    }
    GateConfig {
        name: "task_required",
        initial_status: GateStatus::Open,
        countdown: None,
        triggers: Vec::new(),
        policies,
    }
}

/// Custodiet gate: ops accumulate since the last compliance review; a
/// countdown warns as the threshold approaches, the policy denies past it,
/// and invoking the custodiet skill resets the counter.
fn custodiet(modes: &GateModes) -> GateConfig {
    let mut policies = Vec::new();
    if modes.custodiet != GateMode::Off {
        policies.push(GatePolicy {
            condition: GateCondition {
                hook_event: Some("PreToolUse"),
                min_ops_since_open: Some(modes.custodiet_threshold),
                custom_check: Some("mutating_tool"),
                ..GateCondition::default()
            },
            verdict: modes.custodiet.verdict(),
            custom_action: None,
            message_template:
                "Compliance check overdue: {ops_since_open} ops since the last custodiet review.",
            context_template: Some(
                "Invoke the custodiet skill to run a compliance review before further \
                 state-modifying tools. Ops since last review: {ops_since_open}.",
            ),
        });
    }
    GateConfig {
        name: "custodiet",
        initial_status: GateStatus::Open,
        countdown: Some(Countdown {
            metric: "ops_since_open",
            threshold: modes.custodiet_threshold,
            start_before: modes.custodiet_start_before,
            message_template:
                "Compliance check due in {remaining} ops (threshold {threshold}). \
                 Run the custodiet skill to reset the counter.",
        }),
        triggers: vec![GateTrigger {
            condition: GateCondition {
                hook_event: Some("PostToolUse"),
                custom_check: Some("custodiet_invoked"),
                ..GateCondition::default()
            },
            transition: GateTransition {
                reset_ops_counter: true,
                custom_action: Some("record_compliance"),
                system_message_template: Some("Compliance verified. Custodiet counter reset."),
                ..GateTransition::default()
            },
        }],
        policies,
    }
}

/// Handover gate: starts open (nothing to hand over); any destructive tool
/// closes it; the handover skill or a valid framework reflection reopens
/// it. Stop is denied only when the gate is closed AND work is at risk.
fn handover() -> GateConfig {
    GateConfig {
        name: "handover",
        initial_status: GateStatus::Open,
        countdown: None,
        triggers: vec![
            GateTrigger {
                condition: GateCondition {
                    hook_event: Some("PostToolUse"),
                    custom_check: Some("handover_invoked"),
                    ..GateCondition::default()
                },
                transition: GateTransition {
                    target_status: Some(GateStatus::Open),
                    custom_action: Some("record_handover"),
                    system_message_template: Some(
                        "Handover recorded. Stop gate opens once work is saved.",
                    ),
                    ..GateTransition::default()
                },
            },
            GateTrigger {
                condition: GateCondition {
                    hook_event: Some("AfterAgent"),
                    custom_check: Some("response_has_valid_reflection"),
                    ..GateCondition::default()
                },
                transition: GateTransition {
                    target_status: Some(GateStatus::Open),
                    custom_action: Some("record_handover"),
                    system_message_template: Some(
                        "Framework reflection validated. Handover gate open.",
                    ),
                    ..GateTransition::default()
                },
            },
            GateTrigger {
                condition: GateCondition {
                    hook_event: Some("AfterAgent"),
                    custom_check: Some("response_has_partial_reflection"),
                    ..GateCondition::default()
                },
                transition: GateTransition {
                    custom_action: Some("reflection_warning"),
                    ..GateTransition::default()
                },
            },
            GateTrigger {
                condition: GateCondition {
                    hook_event: Some("PostToolUse"),
                    custom_check: Some("destructive_tool_used"),
                    ..GateCondition::default()
                },
                transition: GateTransition {
                    target_status: Some(GateStatus::Closed),
                    custom_action: Some("note_destructive_op"),
                    ..GateTransition::default()
                },
            },
        ],
        policies: vec![GatePolicy {
            condition: GateCondition {
                current_status: Some(GateStatus::Closed),
                hook_event: Some("^(Stop|SessionEnd)$"),
                custom_check: Some("handover_stop_blocks"),
                ..GateCondition::default()
            },
            verdict: Verdict::Deny,
            custom_action: None,
            message_template: "Stop blocked: unsaved work with no handover.",
            context_template: Some(
                "Work is at risk: the worktree has uncommitted changes or a task is still \
                 bound. Invoke the handover skill and print a complete framework \
                 reflection, then stop again.",
            ),
        }],
    }
}

/// QA gate: hydrated, non-streamlined sessions must run QA before stop.
fn qa() -> GateConfig {
    GateConfig {
        name: "qa",
        initial_status: GateStatus::Open,
        countdown: None,
        triggers: vec![GateTrigger {
            condition: GateCondition {
                hook_event: Some("PostToolUse"),
                custom_check: Some("qa_invoked"),
                ..GateCondition::default()
            },
            transition: GateTransition {
                custom_action: Some("record_qa"),
                system_message_template: Some("QA invocation recorded."),
                ..GateTransition::default()
            },
        }],
        policies: vec![GatePolicy {
            condition: GateCondition {
                hook_event: Some("^(Stop|SessionEnd)$"),
                custom_check: Some("qa_required"),
                ..GateCondition::default()
            },
            verdict: Verdict::Deny,
            custom_action: None,
            message_template: "Stop blocked: QA verification required.",
            context_template: Some(
                "Invoke the qa agent to verify the work against its acceptance criteria. \
                 After QA passes, stop again.",
            ),
        }],
    }
}

/// Critic gate: a hydration plan with zero sub-agents run means the plan
/// was never reviewed; stop is denied until the critic runs.
fn critic() -> GateConfig {
    GateConfig {
        name: "critic",
        initial_status: GateStatus::Open,
        countdown: None,
        triggers: vec![GateTrigger {
            condition: GateCondition {
                hook_event: Some("PostToolUse"),
                custom_check: Some("critic_invoked"),
                ..GateCondition::default()
            },
            transition: GateTransition {
                custom_action: Some("record_critic"),
                system_message_template: Some("Critic invocation recorded."),
                ..GateTransition::default()
            },
        }],
        policies: vec![GatePolicy {
            condition: GateCondition {
                hook_event: Some("^(Stop|SessionEnd)$"),
                custom_check: Some("critic_required"),
                ..GateCondition::default()
            },
            verdict: Verdict::Deny,
            custom_action: None,
            message_template: "Stop blocked: hydration plan has not been reviewed.",
            context_template: Some(
                "A hydration plan exists but no sub-agent has run since. Invoke the critic \
                 to review the plan before stopping.",
            ),
        }],
    }
}

#[cfg(test)]
#[path = "builtin_tests.rs"]
mod tests;
