// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Safety Application Service
//!
//! Checks a proposed action against the caller's permission level and the
//! parameter inspector, and rewrites steps into a sandboxed form when the
//! permission gap is the only thing standing in the way.
//!
//! Blocking is data: every failure mode, including an unreachable
//! permission registry, comes back as violations on a
//! [`SafetyCheckResult`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info};

use crate::domain::action::PlanStep;
use crate::domain::config::SafetyConfig;
use crate::domain::error::GovernanceError;
use crate::domain::events::GovernanceEvent;
use crate::domain::parameter_inspector::ParameterInspector;
use crate::domain::permission::{Permission, PermissionLevel, PermissionRepository};
use crate::domain::policy::{ResourceLimits, SandboxMode, SandboxPolicy};
use crate::domain::safety::{SafetyCheckResult, SandboxOutcome};
use crate::infrastructure::event_bus::EventBus;

#[async_trait]
pub trait SafetyGuard: Send + Sync {
    /// Deterministic for a given registry state.
    async fn check_safety(
        &self,
        action: &str,
        parameters: &[(String, String)],
        current_level: PermissionLevel,
    ) -> SafetyCheckResult;

    /// Total: unknown actions map to the fail-closed level.
    async fn get_required_permission(&self, action: &str) -> PermissionLevel;

    async fn sandbox_step(&self, step: &PlanStep, current_level: PermissionLevel) -> SandboxOutcome;

    async fn register_permission(&self, permission: Permission) -> Result<(), GovernanceError>;

    async fn get_permissions(&self) -> Result<Vec<Permission>, GovernanceError>;
}

/// Built-in permission table for common agent tools.
pub fn default_permissions() -> Vec<Permission> {
    vec![
        Permission::new("read_file", PermissionLevel::ReadOnly),
        Permission::new("list_directory", PermissionLevel::ReadOnly),
        Permission::new("search", PermissionLevel::ReadOnly),
        Permission::new("http.get", PermissionLevel::Limited),
        Permission::new("write_file", PermissionLevel::Limited)
            .with_sandbox(SandboxMode::DryRun)
            .with_description("Writes are previewed when the caller lacks write access"),
        Permission::new("http.post", PermissionLevel::Elevated).with_sandbox(SandboxMode::DryRun),
        Permission::new("execute_command", PermissionLevel::Elevated)
            .with_sandbox(SandboxMode::ResourceCapped),
        Permission::new("delete_file", PermissionLevel::Elevated).with_sandbox(SandboxMode::DryRun),
        Permission::new("deploy.*", PermissionLevel::Full).with_sandbox(SandboxMode::DryRun),
    ]
}

pub struct StandardSafetyGuard {
    repository: Arc<dyn PermissionRepository>,
    inspector: ParameterInspector,
    fail_closed_level: PermissionLevel,
    sandbox_limits: ResourceLimits,
    event_bus: Option<Arc<EventBus>>,
}

impl StandardSafetyGuard {
    pub fn new(repository: Arc<dyn PermissionRepository>, config: &SafetyConfig) -> Self {
        Self {
            repository,
            inspector: ParameterInspector::new(),
            fail_closed_level: config.fail_closed_level,
            sandbox_limits: config.sandbox_limits.clone(),
            event_bus: None,
        }
    }

    pub fn with_inspector(mut self, inspector: ParameterInspector) -> Self {
        self.inspector = inspector;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Seed the registry with [`default_permissions`].
    pub async fn with_default_permissions(self) -> Result<Self, GovernanceError> {
        for permission in default_permissions() {
            self.register_permission(permission).await?;
        }
        Ok(self)
    }

    fn rewrite(&self, step: &PlanStep, mode: SandboxMode, current_level: PermissionLevel) -> PlanStep {
        let mut rewritten = step.clone().with_parameter("sandbox.mode", mode.as_str());
        if mode == SandboxMode::DryRun {
            rewritten = rewritten.with_parameter("dry_run", "true");
        }
        rewritten.required_level = match mode {
            SandboxMode::ReadOnlySimulation => PermissionLevel::ReadOnly,
            SandboxMode::DryRun | SandboxMode::ResourceCapped => current_level,
        };
        rewritten.sandbox = Some(SandboxPolicy::new(mode, self.sandbox_limits.clone()));
        rewritten
    }
}

#[async_trait]
impl SafetyGuard for StandardSafetyGuard {
    async fn check_safety(
        &self,
        action: &str,
        parameters: &[(String, String)],
        current_level: PermissionLevel,
    ) -> SafetyCheckResult {
        let permission = match self.repository.resolve(action).await {
            Ok(permission) => permission,
            Err(e) => {
                error!(action = action, error = %e, "Permission registry unavailable, blocking");
                return SafetyCheckResult::blocked(
                    format!("permission registry unavailable: {e}"),
                    self.fail_closed_level,
                );
            }
        };

        let mut violations = Vec::new();
        let mut warnings = Vec::new();

        let required_level = match &permission {
            Some(permission) => permission.required_level,
            None => {
                warnings.push(format!(
                    "no permission registered for '{}', defaulting to {}",
                    action, self.fail_closed_level
                ));
                self.fail_closed_level
            }
        };

        let permission_gap = current_level < required_level;
        if permission_gap {
            violations.push(format!(
                "insufficient permission level: '{}' requires {}, current level is {}",
                action, required_level, current_level
            ));
        }

        let inspection = self.inspector.inspect(parameters);
        let parameters_clean = inspection.violations.is_empty();
        violations.extend(inspection.violations);
        warnings.extend(inspection.warnings);

        let sandbox_mode = if permission_gap && parameters_clean {
            permission.as_ref().and_then(|p| p.sandbox)
        } else {
            None
        };

        let result = SafetyCheckResult::new(violations, warnings, required_level, sandbox_mode);
        debug!(
            action = action,
            current_level = %current_level,
            required_level = %required_level,
            safe = result.safe,
            violations = result.violations.len(),
            "Safety check complete"
        );
        result
    }

    async fn get_required_permission(&self, action: &str) -> PermissionLevel {
        match self.repository.resolve(action).await {
            Ok(Some(permission)) => permission.required_level,
            Ok(None) => self.fail_closed_level,
            Err(e) => {
                error!(action = action, error = %e, "Permission registry unavailable, failing closed");
                self.fail_closed_level
            }
        }
    }

    async fn sandbox_step(&self, step: &PlanStep, current_level: PermissionLevel) -> SandboxOutcome {
        let check = self
            .check_safety(&step.action, &step.parameters, current_level)
            .await;

        if check.safe {
            return SandboxOutcome::NotRequired(step.clone());
        }
        match check.sandbox_mode {
            Some(mode) => {
                info!(
                    action = %step.action,
                    mode = mode.as_str(),
                    required_level = %check.required_level,
                    current_level = %current_level,
                    "Sandboxing step"
                );
                SandboxOutcome::Rewritten(self.rewrite(step, mode, current_level))
            }
            None => SandboxOutcome::Unavailable(check),
        }
    }

    async fn register_permission(&self, permission: Permission) -> Result<(), GovernanceError> {
        permission
            .validate()
            .map_err(GovernanceError::InvalidPermission)?;

        let resource = permission.resource.clone();
        let required_level = permission.required_level;
        let replaced = self.repository.save(permission).await?.is_some();

        info!(
            resource = %resource,
            required_level = %required_level,
            replaced = replaced,
            "Permission registered"
        );

        if let Some(event_bus) = &self.event_bus {
            event_bus.publish_governance_event(GovernanceEvent::PermissionRegistered {
                resource,
                required_level,
                replaced,
                registered_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn get_permissions(&self) -> Result<Vec<Permission>, GovernanceError> {
        Ok(self.repository.list_all().await?)
    }
}
