// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use praetor_cortex::CortexError;
use thiserror::Error;

use super::action::ActionId;
use super::lifecycle::ActionPhase;

/// Errors surfaced by the governance layer.
///
/// Policy denials are not errors: a denied or blocked action is a normal,
/// recorded outcome. These variants cover the cases where the loop could not
/// reach a recorded outcome at all.
#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("Action {action_id} cancelled before execution")]
    Cancelled { action_id: ActionId },

    #[error("Invalid lifecycle transition: {from:?} -> {to:?}")]
    InvalidTransition { from: ActionPhase, to: ActionPhase },

    #[error("Memory error: {0}")]
    Memory(#[from] CortexError),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Invalid permission: {0}")]
    InvalidPermission(String),
}

impl From<anyhow::Error> for GovernanceError {
    fn from(err: anyhow::Error) -> Self {
        GovernanceError::Repository(err.to_string())
    }
}
