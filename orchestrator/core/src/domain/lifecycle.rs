// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Action Lifecycle
//!
//! Per-action state machine enforced by the governance loop.
//!
//! ```text
//! Proposed ─► EthicsChecked ─► SafetyChecked ─► (Sandboxed) ─► Executed ─► (Routed) ─► Recorded ─► (SkillExtracted)
//!    │               │
//!    ▼               ▼
//!  Denied         Blocked ──────────────────────────────────────────────────────────► Recorded
//! ```
//!
//! `Denied` and `Blocked` are terminal failure states that still move to
//! `Recorded`: a vetoed action is stored as a failed experience.

use serde::{Deserialize, Serialize};

use super::error::GovernanceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPhase {
    Proposed,
    EthicsChecked,
    SafetyChecked,
    Sandboxed,
    Executed,
    Routed,
    Denied,
    Blocked,
    Recorded,
    SkillExtracted,
}

impl ActionPhase {
    pub fn can_transition_to(self, next: ActionPhase) -> bool {
        use ActionPhase::*;
        matches!(
            (self, next),
            (Proposed, EthicsChecked)
                | (Proposed, Denied)
                | (EthicsChecked, SafetyChecked)
                | (EthicsChecked, Blocked)
                | (SafetyChecked, Sandboxed)
                | (SafetyChecked, Executed)
                | (Sandboxed, Executed)
                | (Executed, Routed)
                | (Executed, Recorded)
                | (Routed, Recorded)
                | (Denied, Recorded)
                | (Blocked, Recorded)
                | (Recorded, SkillExtracted)
        )
    }

    pub fn is_final(self) -> bool {
        matches!(self, ActionPhase::Recorded | ActionPhase::SkillExtracted)
    }
}

/// Phase tracker with full history for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLifecycle {
    history: Vec<ActionPhase>,
}

impl ActionLifecycle {
    pub fn new() -> Self {
        Self {
            history: vec![ActionPhase::Proposed],
        }
    }

    pub fn phase(&self) -> ActionPhase {
        self.history
            .last()
            .copied()
            .unwrap_or(ActionPhase::Proposed)
    }

    pub fn history(&self) -> &[ActionPhase] {
        &self.history
    }

    pub fn visited(&self, phase: ActionPhase) -> bool {
        self.history.contains(&phase)
    }

    pub fn advance(&mut self, next: ActionPhase) -> Result<(), GovernanceError> {
        let from = self.phase();
        if !from.can_transition_to(next) {
            return Err(GovernanceError::InvalidTransition { from, to: next });
        }
        self.history.push(next);
        Ok(())
    }
}

impl Default for ActionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
