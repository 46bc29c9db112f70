// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Human Approval Service - human-in-the-loop gate for sensitive actions
//!
//! Parks each approval request until an operator answers or the timeout
//! elapses. A timeout is a rejection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::approval::{ApprovalDecision, ApprovalGate, ApprovalRequest};
use crate::domain::action::ActionId;

#[derive(Debug)]
struct PendingApproval {
    request: ApprovalRequest,
    created_at: DateTime<Utc>,
    response_tx: oneshot::Sender<ApprovalDecision>,
}

/// Removes a parked request when the waiting future finishes or is dropped,
/// so a cancelled action never leaves an approvable entry behind.
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<Uuid, PendingApproval>>,
    request_id: Uuid,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.pending.lock().remove(&self.request_id).is_some() {
            debug!(request_id = %self.request_id, "Withdrew unanswered approval request");
        }
    }
}

/// Snapshot of a parked request for operator display
#[derive(Debug, Clone)]
pub struct PendingApprovalInfo {
    pub id: Uuid,
    pub action_id: ActionId,
    pub action_name: String,
    pub agent_id: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

pub struct HumanApprovalService {
    pending: Arc<Mutex<HashMap<Uuid, PendingApproval>>>,
    timeout: Duration,
}

impl HumanApprovalService {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    pub async fn approve(
        &self,
        request_id: Uuid,
        approver: Option<String>,
        note: Option<String>,
    ) -> Result<()> {
        let pending = self.take(request_id).await?;
        info!(
            request_id = %request_id,
            action_id = %pending.request.action_id,
            approver = ?approver,
            "Approval granted"
        );
        let _ = pending
            .response_tx
            .send(ApprovalDecision::Approved { approver, note });
        Ok(())
    }

    pub async fn reject(&self, request_id: Uuid, reason: impl Into<String>) -> Result<()> {
        let reason = reason.into();
        let pending = self.take(request_id).await?;
        info!(
            request_id = %request_id,
            action_id = %pending.request.action_id,
            reason = %reason,
            "Approval rejected"
        );
        let _ = pending.response_tx.send(ApprovalDecision::Rejected { reason });
        Ok(())
    }

    /// Withdraw a request; the waiting action sees a rejection.
    pub async fn cancel(&self, request_id: Uuid) -> Result<()> {
        self.reject(request_id, "approval request cancelled").await
    }

    pub async fn list_pending(&self) -> Vec<PendingApprovalInfo> {
        let pending = self.pending.lock();
        let mut infos: Vec<PendingApprovalInfo> = pending
            .iter()
            .map(|(id, p)| PendingApprovalInfo {
                id: *id,
                action_id: p.request.action_id,
                action_name: p.request.action_name.clone(),
                agent_id: p.request.agent_id.clone(),
                reason: p.request.reason.clone(),
                created_at: p.created_at,
            })
            .collect();
        infos.sort_by_key(|info| info.created_at);
        infos
    }

    async fn take(&self, request_id: Uuid) -> Result<PendingApproval> {
        self.pending
            .lock()
            .remove(&request_id)
            .ok_or_else(|| anyhow::anyhow!("Approval request {} not found or already completed", request_id))
    }
}

#[async_trait]
impl ApprovalGate for HumanApprovalService {
    async fn request_approval(&self, request: ApprovalRequest) -> ApprovalDecision {
        let request_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        let action_id = request.action_id;

        info!(
            request_id = %request_id,
            action_id = %action_id,
            action = %request.action_name,
            timeout_seconds = self.timeout.as_secs(),
            "Human approval requested"
        );

        self.pending.lock().insert(
            request_id,
            PendingApproval {
                request,
                created_at: Utc::now(),
                response_tx: tx,
            },
        );
        let _guard = PendingGuard {
            pending: &*self.pending,
            request_id,
        };

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(_)) => ApprovalDecision::Rejected {
                reason: "approval channel closed".to_string(),
            },
            Err(_) => {
                warn!(request_id = %request_id, action_id = %action_id, "Approval request timed out");
                ApprovalDecision::Rejected {
                    reason: format!("no approval within {}s", self.timeout.as_secs()),
                }
            }
        }
    }
}
