// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Approval gate for actions whose ethical verdict is `RequiresApproval`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::action::ActionId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub action_id: ActionId,
    pub action_name: String,
    pub agent_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved {
        approver: Option<String>,
        note: Option<String>,
    },
    Rejected {
        reason: String,
    },
}

impl ApprovalDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalDecision::Approved { .. })
    }
}

/// Decides whether a `RequiresApproval` action may proceed. Implementations
/// must not hang forever; anything short of an explicit approval counts as a
/// rejection.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn request_approval(&self, request: ApprovalRequest) -> ApprovalDecision;
}

/// Rejects every request. Used when no human is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAllApprovals;

#[async_trait]
impl ApprovalGate for DenyAllApprovals {
    async fn request_approval(&self, request: ApprovalRequest) -> ApprovalDecision {
        info!(
            action_id = %request.action_id,
            action = %request.action_name,
            "No approver configured, rejecting"
        );
        ApprovalDecision::Rejected {
            reason: "no approver configured".to_string(),
        }
    }
}

/// Approves every request. Intended for tests and trusted batch runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

#[async_trait]
impl ApprovalGate for AutoApprove {
    async fn request_approval(&self, _request: ApprovalRequest) -> ApprovalDecision {
        ApprovalDecision::Approved {
            approver: Some("auto".to_string()),
            note: None,
        }
    }
}
