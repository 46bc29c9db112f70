// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::fmt;

use serde::{Deserialize, Serialize};

/// Recommended recovery when confidence is too low to proceed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    Retry,
    UseConservativeApproach,
    Defer,
    RequestClarification,
    DecomposeTask,
    GatherMoreContext,
    EscalateToHuman,
    UseDefault,
}

impl FallbackStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackStrategy::Retry => "retry",
            FallbackStrategy::UseConservativeApproach => "use_conservative_approach",
            FallbackStrategy::Defer => "defer",
            FallbackStrategy::RequestClarification => "request_clarification",
            FallbackStrategy::DecomposeTask => "decompose_task",
            FallbackStrategy::GatherMoreContext => "gather_more_context",
            FallbackStrategy::EscalateToHuman => "escalate_to_human",
            FallbackStrategy::UseDefault => "use_default",
        }
    }

    /// Strategies that let the task continue on its current path.
    pub fn is_proceed(&self) -> bool {
        matches!(self, FallbackStrategy::UseDefault | FallbackStrategy::Retry)
    }
}

impl fmt::Display for FallbackStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of work the router classifies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingTask {
    pub id: String,
    pub description: String,
    /// Caller-declared risk in `[0, 1]`, if known.
    pub declared_risk: Option<f64>,
    pub attempt_count: u32,
    /// Whether the previous attempt failed for a transient reason
    /// (timeout, rate limit) rather than a wrong approach.
    pub last_failure_transient: bool,
}

impl RoutingTask {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            declared_risk: None,
            attempt_count: 0,
            last_failure_transient: false,
        }
    }

    pub fn with_attempts(mut self, attempt_count: u32) -> Self {
        self.attempt_count = attempt_count;
        self
    }

    pub fn with_risk(mut self, risk: f64) -> Self {
        self.declared_risk = Some(risk);
        self
    }

    pub fn with_transient_failure(mut self) -> Self {
        self.last_failure_transient = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub confidence: f64,
    pub should_proceed: bool,
    pub strategy: FallbackStrategy,
    pub reason: String,
    pub requires_human_oversight: bool,
}
