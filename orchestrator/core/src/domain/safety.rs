// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};

use super::action::PlanStep;
use super::permission::PermissionLevel;
use super::policy::SandboxMode;

/// Verdict of a safety check. Violations block execution; warnings are
/// advisory. Blocking is reported as data, never as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyCheckResult {
    pub safe: bool,
    pub violations: Vec<String>,
    pub warnings: Vec<String>,
    pub required_level: PermissionLevel,
    /// Set only when the permission gap is the sole violation and the
    /// resource declares a restricted mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_mode: Option<SandboxMode>,
}

impl SafetyCheckResult {
    pub fn new(
        violations: Vec<String>,
        warnings: Vec<String>,
        required_level: PermissionLevel,
        sandbox_mode: Option<SandboxMode>,
    ) -> Self {
        Self {
            safe: violations.is_empty(),
            violations,
            warnings,
            required_level,
            sandbox_mode,
        }
    }

    pub fn blocked(violation: impl Into<String>, required_level: PermissionLevel) -> Self {
        Self::new(vec![violation.into()], Vec::new(), required_level, None)
    }

    pub fn is_sandboxable(&self) -> bool {
        !self.safe && self.sandbox_mode.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SandboxOutcome {
    /// The step already passes at the caller's level.
    NotRequired(PlanStep),
    /// A restricted variant of the step that passes at the caller's level.
    Rewritten(PlanStep),
    /// No safe rewrite exists; the check explains why.
    Unavailable(SafetyCheckResult),
}
