// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Ethical clearance types.
//!
//! Verdicts are ordered from least to most restrictive so that combining the
//! verdicts of several evaluations is a `max`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::action::ActionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EthicalVerdict {
    Permitted,
    RequiresApproval,
    Denied,
}

impl EthicalVerdict {
    pub fn most_restrictive(self, other: Self) -> Self {
        self.max(other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EthicalVerdict::Permitted => "permitted",
            EthicalVerdict::RequiresApproval => "requires_approval",
            EthicalVerdict::Denied => "denied",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthicalClearance {
    pub verdict: EthicalVerdict,
    pub reason: String,
    /// Id of the principle that drove a non-permitted verdict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principle: Option<String>,
}

impl EthicalClearance {
    pub fn permitted(reason: impl Into<String>) -> Self {
        Self {
            verdict: EthicalVerdict::Permitted,
            reason: reason.into(),
            principle: None,
        }
    }

    pub fn requires_approval(reason: impl Into<String>) -> Self {
        Self {
            verdict: EthicalVerdict::RequiresApproval,
            reason: reason.into(),
            principle: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            verdict: EthicalVerdict::Denied,
            reason: reason.into(),
            principle: None,
        }
    }

    pub fn with_principle(mut self, principle: impl Into<String>) -> Self {
        self.principle = Some(principle.into());
        self
    }

    pub fn is_permitted(&self) -> bool {
        self.verdict == EthicalVerdict::Permitted
    }

    pub fn is_denied(&self) -> bool {
        self.verdict == EthicalVerdict::Denied
    }

    pub fn requires_approval_gate(&self) -> bool {
        self.verdict == EthicalVerdict::RequiresApproval
    }

    /// Keep whichever clearance is more restrictive; `self` wins ties.
    pub fn combine(self, other: EthicalClearance) -> EthicalClearance {
        if other.verdict > self.verdict {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EthicalPrinciple {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// Core principles, highest priority first. Read-only at runtime.
pub static CORE_PRINCIPLES: [EthicalPrinciple; 5] = [
    EthicalPrinciple {
        id: "do_no_harm",
        name: "Do no harm",
        description: "Never take actions that damage people, their data or the systems they rely on.",
    },
    EthicalPrinciple {
        id: "human_oversight",
        name: "Preserve human oversight",
        description: "Never weaken the mechanisms that let humans observe, correct or stop the agent.",
    },
    EthicalPrinciple {
        id: "respect_autonomy",
        name: "Respect autonomy",
        description: "Obtain consent before acting on behalf of people or involving them as subjects.",
    },
    EthicalPrinciple {
        id: "privacy",
        name: "Protect privacy",
        description: "Handle credentials and personal data only with explicit authorisation.",
    },
    EthicalPrinciple {
        id: "accountability",
        name: "Stay accountable",
        description: "Keep actions attributable and auditable; escalate irreversible decisions.",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcernSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthicalConcern {
    pub id: Uuid,
    pub description: String,
    pub severity: ConcernSeverity,
    pub action: Option<String>,
    pub raised_at: DateTime<Utc>,
}

impl EthicalConcern {
    pub fn new(description: impl Into<String>, severity: ConcernSeverity) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            severity,
            action: None,
            raised_at: Utc::now(),
        }
    }

    pub fn for_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

/// Receiver of ethical concerns. Implementations must return promptly and
/// never fail the caller.
pub trait AuditSink: Send + Sync {
    fn record_concern(&self, concern: &EthicalConcern, context: &ActionContext);
}
