// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use praetor_cortex::{ExperienceId, SkillId};
use serde::{Deserialize, Serialize};

use crate::domain::action::ActionId;
use crate::domain::ethics::{ConcernSeverity, EthicalVerdict};
use crate::domain::permission::PermissionLevel;
use crate::domain::policy::SandboxMode;
use crate::domain::routing::FallbackStrategy;

/// Governance decision events, one stream per proposed action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GovernanceEvent {
    ActionProposed {
        action_id: ActionId,
        action: String,
        agent_id: String,
        requested_level: PermissionLevel,
        proposed_at: DateTime<Utc>,
    },
    ApprovalRequested {
        action_id: ActionId,
        reason: String,
        requested_at: DateTime<Utc>,
    },
    ActionDenied {
        action_id: ActionId,
        verdict: EthicalVerdict,
        reason: String,
        denied_at: DateTime<Utc>,
    },
    ActionBlocked {
        action_id: ActionId,
        violations: Vec<String>,
        required_level: PermissionLevel,
        blocked_at: DateTime<Utc>,
    },
    StepSandboxed {
        action_id: ActionId,
        mode: SandboxMode,
        sandboxed_at: DateTime<Utc>,
    },
    ActionExecuted {
        action_id: ActionId,
        success: bool,
        confidence: f64,
        elapsed_ms: u64,
        executed_at: DateTime<Utc>,
    },
    ActionRouted {
        action_id: ActionId,
        strategy: FallbackStrategy,
        confidence: f64,
        requires_human_oversight: bool,
        routed_at: DateTime<Utc>,
    },
    ExperienceRecorded {
        action_id: ActionId,
        experience_id: ExperienceId,
        success: bool,
        skill_id: Option<SkillId>,
        recorded_at: DateTime<Utc>,
    },
    EthicalConcernReported {
        concern_id: uuid::Uuid,
        description: String,
        severity: ConcernSeverity,
        agent_id: String,
        reported_at: DateTime<Utc>,
    },
    PermissionRegistered {
        resource: String,
        required_level: PermissionLevel,
        replaced: bool,
        registered_at: DateTime<Utc>,
    },
}

impl GovernanceEvent {
    /// The action this event belongs to, if it is action-scoped.
    pub fn action_id(&self) -> Option<ActionId> {
        match self {
            GovernanceEvent::ActionProposed { action_id, .. }
            | GovernanceEvent::ApprovalRequested { action_id, .. }
            | GovernanceEvent::ActionDenied { action_id, .. }
            | GovernanceEvent::ActionBlocked { action_id, .. }
            | GovernanceEvent::StepSandboxed { action_id, .. }
            | GovernanceEvent::ActionExecuted { action_id, .. }
            | GovernanceEvent::ActionRouted { action_id, .. }
            | GovernanceEvent::ExperienceRecorded { action_id, .. } => Some(*action_id),
            GovernanceEvent::EthicalConcernReported { .. }
            | GovernanceEvent::PermissionRegistered { .. } => None,
        }
    }
}
