// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};

/// How a sandboxed step is restricted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxMode {
    /// Plan and validate the step without applying its effects.
    DryRun,
    /// Run against a read-only view; writes are simulated.
    ReadOnlySimulation,
    /// Run for real under tight resource limits.
    ResourceCapped,
}

impl SandboxMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SandboxMode::DryRun => "dry_run",
            SandboxMode::ReadOnlySimulation => "read_only_simulation",
            SandboxMode::ResourceCapped => "resource_capped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyMode {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub cpu_us: u64,
    pub memory_mb: u64,
    pub timeout_seconds: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu_us: 250_000,
            memory_mb: 256,
            timeout_seconds: 30,
        }
    }
}

/// Restrictions attached to a plan step by the safety guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxPolicy {
    pub mode: SandboxMode,
    pub limits: ResourceLimits,
    pub network: PolicyMode,
}

impl SandboxPolicy {
    pub fn new(mode: SandboxMode, limits: ResourceLimits) -> Self {
        Self {
            mode,
            limits,
            network: PolicyMode::Deny,
        }
    }

    /// Whether the step may have externally visible side effects at all.
    pub fn allows_side_effects(&self) -> bool {
        matches!(self.mode, SandboxMode::ResourceCapped)
    }
}
