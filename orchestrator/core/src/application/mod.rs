// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod approval;
pub mod ethics;
pub mod governance;
pub mod safety;
pub mod uncertainty;

pub use approval::{ApprovalDecision, ApprovalGate, ApprovalRequest, AutoApprove, DenyAllApprovals};
pub use ethics::{EthicalRule, EthicalSubject, EthicsFramework, StandardEthicsFramework};
pub use governance::{GovernanceLoop, GovernanceOutcome, GovernanceServices, OutcomeStatus};
pub use safety::{default_permissions, SafetyGuard, StandardSafetyGuard};
pub use uncertainty::{StandardUncertaintyRouter, UncertaintyRouter};
