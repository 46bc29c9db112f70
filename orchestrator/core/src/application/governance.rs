// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Governance Loop
//!
//! Drives one proposed action through
//! `Ethics → Safety → (Sandbox) → Execute → (Route) → Record → (Extract skill)`.
//!
//! Every action that gets past cancellation ends up as exactly one stored
//! experience, including denied and blocked ones. Skill bookkeeping happens
//! after recording and never fails an outcome that is already stored.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use praetor_cortex::{
    CortexError, Experience, ExperienceId, ExecutionRecord, InMemoryExperienceRepository,
    InMemorySkillRepository, SkillId, Verification,
};
use praetor_cortex::application::{
    MemoryPruner, MemoryStore, SkillRegistry, StandardMemoryStore, StandardSkillRegistry,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::approval::{ApprovalDecision, ApprovalGate, ApprovalRequest};
use crate::application::ethics::{EthicsFramework, StandardEthicsFramework};
use crate::application::safety::{SafetyGuard, StandardSafetyGuard};
use crate::application::uncertainty::{StandardUncertaintyRouter, UncertaintyRouter};
use crate::domain::action::{ActionContext, ActionId, PlanStep, ProposedAction};
use crate::domain::config::GovernanceConfigSpec;
use crate::domain::error::GovernanceError;
use crate::domain::ethics::{AuditSink, EthicalClearance};
use crate::domain::events::GovernanceEvent;
use crate::domain::executor::{ActionExecutor, ExecutionReport};
use crate::domain::lifecycle::{ActionLifecycle, ActionPhase};
use crate::domain::routing::{RoutingDecision, RoutingTask};
use crate::domain::safety::{SafetyCheckResult, SandboxOutcome};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::permission_registry::InMemoryPermissionRepository;

/// Context attribute naming a skill the action is an execution of.
pub const SKILL_ID_ATTRIBUTE: &str = "skill_id";
/// Context attribute overriding the name of an extracted skill.
pub const SKILL_NAME_ATTRIBUTE: &str = "skill_name";
/// Context attribute overriding the category of an extracted skill.
pub const SKILL_CATEGORY_ATTRIBUTE: &str = "skill_category";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
    Denied,
    Blocked,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Succeeded => "succeeded",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::Denied => "denied",
            OutcomeStatus::Blocked => "blocked",
        }
    }
}

/// Everything the loop decided about one action.
#[derive(Debug, Clone)]
pub struct GovernanceOutcome {
    pub action_id: ActionId,
    pub status: OutcomeStatus,
    pub phases: Vec<ActionPhase>,
    pub clearance: EthicalClearance,
    pub safety: Option<SafetyCheckResult>,
    pub sandboxed: bool,
    pub report: Option<ExecutionReport>,
    pub routing: Option<RoutingDecision>,
    pub experience_id: ExperienceId,
    pub skill_id: Option<SkillId>,
}

impl GovernanceOutcome {
    pub fn executed(&self) -> bool {
        self.report.is_some()
    }
}

/// The collaborators the loop composes.
#[derive(Clone)]
pub struct GovernanceServices {
    pub ethics: Arc<dyn EthicsFramework>,
    pub safety: Arc<dyn SafetyGuard>,
    pub router: Arc<dyn UncertaintyRouter>,
    pub memory: Arc<dyn MemoryStore>,
    pub skills: Arc<dyn SkillRegistry>,
    pub approvals: Arc<dyn ApprovalGate>,
    pub executor: Arc<dyn ActionExecutor>,
    pub event_bus: Arc<EventBus>,
}

impl GovernanceServices {
    /// Standard components over in-memory stores, wired to one event bus.
    pub async fn in_memory(
        spec: &GovernanceConfigSpec,
        audit_sink: Arc<dyn AuditSink>,
        approvals: Arc<dyn ApprovalGate>,
        executor: Arc<dyn ActionExecutor>,
        event_bus: Arc<EventBus>,
    ) -> Result<Self, GovernanceError> {
        let mut safety = StandardSafetyGuard::new(
            Arc::new(InMemoryPermissionRepository::new()),
            &spec.safety,
        )
        .with_event_bus(event_bus.clone());
        if spec.safety.default_permissions {
            safety = safety.with_default_permissions().await?;
        }

        let memory = StandardMemoryStore::new(
            Arc::new(InMemoryExperienceRepository::new()),
            event_bus.clone(),
        );
        let skills = StandardSkillRegistry::new(
            Arc::new(InMemorySkillRepository::new()),
            event_bus.clone(),
            spec.skills.registry.clone(),
        );

        Ok(Self {
            ethics: Arc::new(StandardEthicsFramework::new(audit_sink)),
            safety: Arc::new(safety),
            router: Arc::new(StandardUncertaintyRouter::new(spec.uncertainty.clone())),
            memory: Arc::new(memory),
            skills: Arc::new(skills),
            approvals,
            executor,
            event_bus,
        })
    }
}

pub struct GovernanceLoop {
    services: GovernanceServices,
    spec: GovernanceConfigSpec,
}

/// Per-action working state threaded through the stages.
struct Progress<'a> {
    action: &'a ProposedAction,
    context: &'a ActionContext,
    lifecycle: ActionLifecycle,
    clearance: EthicalClearance,
    safety: Option<SafetyCheckResult>,
    sandboxed: bool,
}

impl GovernanceLoop {
    pub fn new(services: GovernanceServices, spec: GovernanceConfigSpec) -> Self {
        Self { services, spec }
    }

    pub fn services(&self) -> &GovernanceServices {
        &self.services
    }

    pub fn memory(&self) -> &Arc<dyn MemoryStore> {
        &self.services.memory
    }

    pub fn skills(&self) -> &Arc<dyn SkillRegistry> {
        &self.services.skills
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.services.event_bus
    }

    /// Background pruner for the loop's memory store, if retention is enabled.
    pub fn memory_pruner(&self) -> Option<Arc<MemoryPruner>> {
        let config = self.spec.memory.pruner.clone();
        config
            .enabled
            .then(|| Arc::new(MemoryPruner::new(self.services.memory.clone(), config)))
    }

    pub async fn process(
        &self,
        action: &ProposedAction,
        context: &ActionContext,
        cancel: &CancellationToken,
    ) -> Result<GovernanceOutcome, GovernanceError> {
        let action_id = action.id();
        info!(
            action_id = %action_id,
            action = action.name(),
            requested_level = %action.requested_level(),
            context = %context,
            "Governing proposed action"
        );
        self.publish(GovernanceEvent::ActionProposed {
            action_id,
            action: action.name().to_string(),
            agent_id: context.agent_id.clone(),
            requested_level: action.requested_level(),
            proposed_at: action.proposed_at(),
        });
        Self::check_cancelled(cancel, action_id)?;

        let clearance = self.clear(action, context, cancel).await?;
        let mut progress = Progress {
            action,
            context,
            lifecycle: ActionLifecycle::new(),
            clearance,
            safety: None,
            sandboxed: false,
        };

        if progress.clearance.is_denied() {
            progress.lifecycle.advance(ActionPhase::Denied)?;
            self.publish(GovernanceEvent::ActionDenied {
                action_id,
                verdict: progress.clearance.verdict,
                reason: progress.clearance.reason.clone(),
                denied_at: Utc::now(),
            });
            return self.conclude_vetoed(progress, OutcomeStatus::Denied).await;
        }
        progress.lifecycle.advance(ActionPhase::EthicsChecked)?;

        let step = match self.secure(&mut progress).await? {
            Some(step) => step,
            None => return self.conclude_vetoed(progress, OutcomeStatus::Blocked).await,
        };

        // Last point at which cancellation is honoured.
        Self::check_cancelled(cancel, action_id)?;

        let report = match self.services.executor.execute(&step, context).await {
            Ok(report) => report,
            Err(e) => {
                warn!(action_id = %action_id, error = %e, "Executor failed");
                ExecutionReport::failed(e.to_string())
            }
        };
        progress.lifecycle.advance(ActionPhase::Executed)?;
        self.publish(GovernanceEvent::ActionExecuted {
            action_id,
            success: report.success,
            confidence: report.confidence,
            elapsed_ms: report.elapsed_ms,
            executed_at: Utc::now(),
        });

        let routing = self.route(&mut progress, &report).await?;
        self.conclude_executed(progress, step, report, routing).await
    }

    fn check_cancelled(cancel: &CancellationToken, action_id: ActionId) -> Result<(), GovernanceError> {
        if cancel.is_cancelled() {
            info!(action_id = %action_id, "Action cancelled before execution");
            return Err(GovernanceError::Cancelled { action_id });
        }
        Ok(())
    }

    fn publish(&self, event: GovernanceEvent) {
        self.services.event_bus.publish_governance_event(event);
    }

    /// Ethics verdict, with `RequiresApproval` resolved through the gate.
    async fn clear(
        &self,
        action: &ProposedAction,
        context: &ActionContext,
        cancel: &CancellationToken,
    ) -> Result<EthicalClearance, GovernanceError> {
        let clearance = self.services.ethics.evaluate_action(action, context).await;
        if !clearance.requires_approval_gate() {
            return Ok(clearance);
        }

        let action_id = action.id();
        self.publish(GovernanceEvent::ApprovalRequested {
            action_id,
            reason: clearance.reason.clone(),
            requested_at: Utc::now(),
        });
        let request = ApprovalRequest {
            action_id,
            action_name: action.name().to_string(),
            agent_id: context.agent_id.clone(),
            reason: clearance.reason.clone(),
        };

        let decision = tokio::select! {
            _ = cancel.cancelled() => return Err(GovernanceError::Cancelled { action_id }),
            decision = self.services.approvals.request_approval(request) => decision,
        };

        Ok(match decision {
            ApprovalDecision::Approved { approver, .. } => {
                info!(action_id = %action_id, approver = ?approver, "Action approved");
                clearance
            }
            ApprovalDecision::Rejected { reason } => {
                EthicalClearance::denied(format!("approval rejected: {reason}"))
                    .with_principle("human_oversight")
            }
        })
    }

    /// Safety check plus sandbox rewrite. `None` means blocked.
    async fn secure(&self, progress: &mut Progress<'_>) -> Result<Option<PlanStep>, GovernanceError> {
        let action = progress.action;
        let level = action.requested_level();
        let check = self
            .services
            .safety
            .check_safety(action.name(), action.parameters(), level)
            .await;

        let step = action.to_plan_step();
        let (step, check) = if check.safe {
            (Some(step), check)
        } else if check.is_sandboxable() {
            match self.services.safety.sandbox_step(&step, level).await {
                SandboxOutcome::Rewritten(rewritten) => (Some(rewritten), check),
                SandboxOutcome::NotRequired(step) => (Some(step), check),
                SandboxOutcome::Unavailable(unavailable) => (None, unavailable),
            }
        } else {
            (None, check)
        };

        let Some(step) = step else {
            warn!(
                action_id = %action.id(),
                action = action.name(),
                violations = ?check.violations,
                "Action blocked"
            );
            progress.lifecycle.advance(ActionPhase::Blocked)?;
            self.publish(GovernanceEvent::ActionBlocked {
                action_id: action.id(),
                violations: check.violations.clone(),
                required_level: check.required_level,
                blocked_at: Utc::now(),
            });
            progress.safety = Some(check);
            return Ok(None);
        };

        progress.lifecycle.advance(ActionPhase::SafetyChecked)?;
        if let Some(policy) = &step.sandbox {
            progress.lifecycle.advance(ActionPhase::Sandboxed)?;
            progress.sandboxed = true;
            metrics::counter!("praetor_sandboxed_total").increment(1);
            self.publish(GovernanceEvent::StepSandboxed {
                action_id: action.id(),
                mode: policy.mode,
                sandboxed_at: Utc::now(),
            });
        }
        progress.safety = Some(check);
        Ok(Some(step))
    }

    /// Consult the router when execution confidence is below acceptance.
    async fn route(
        &self,
        progress: &mut Progress<'_>,
        report: &ExecutionReport,
    ) -> Result<Option<RoutingDecision>, GovernanceError> {
        let acceptance = self.spec.uncertainty.acceptance_threshold;
        if report.confidence.is_finite() && report.confidence >= acceptance {
            return Ok(None);
        }

        let action = progress.action;
        let mut task = RoutingTask::new(
            action.id().to_string(),
            progress.context.goal.clone().unwrap_or_else(|| action.name().to_string()),
        )
        .with_attempts(progress.context.attempt);
        if !report.success && report.transient_failure {
            task = task.with_transient_failure();
        }

        let decision = self
            .services
            .router
            .route(&task, progress.context, report.confidence)
            .await;
        progress.lifecycle.advance(ActionPhase::Routed)?;

        metrics::counter!("praetor_routed_total", "strategy" => decision.strategy.as_str()).increment(1);
        self.publish(GovernanceEvent::ActionRouted {
            action_id: action.id(),
            strategy: decision.strategy,
            confidence: decision.confidence,
            requires_human_oversight: decision.requires_human_oversight,
            routed_at: Utc::now(),
        });
        Ok(Some(decision))
    }

    fn experience(
        &self,
        progress: &Progress<'_>,
        status: OutcomeStatus,
        quality_score: f64,
        notes: &str,
        routing: Option<&RoutingDecision>,
    ) -> Experience {
        let action = progress.action;
        let goal = progress
            .context
            .goal
            .clone()
            .unwrap_or_else(|| action.name().to_string());

        let mut tags = vec![
            format!("action:{}", action.name()),
            format!("outcome:{}", status.as_str()),
        ];
        if progress.sandboxed {
            tags.push("sandboxed".to_string());
        }
        if let Some(decision) = routing {
            tags.push(format!("routed:{}", decision.strategy));
        }

        Experience::new(
            goal,
            progress.context.to_string(),
            status == OutcomeStatus::Succeeded,
            Verification::new(quality_score).with_notes(notes),
        )
        .with_tags(tags)
    }

    /// Store with bounded retries; the experience keeps its id across attempts.
    async fn record(&self, experience: Experience) -> Result<ExperienceId, GovernanceError> {
        let max_attempts = self.spec.memory.max_record_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.services.memory.store_experience(experience.clone()).await {
                Ok(id) => return Ok(id),
                Err(e) if attempt < max_attempts => {
                    warn!(
                        experience_id = %experience.id(),
                        attempt,
                        error = %e,
                        "Failed to record experience, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
                }
                Err(e) => return Err(GovernanceError::Memory(e)),
            }
        }
    }

    async fn conclude_vetoed(
        &self,
        mut progress: Progress<'_>,
        status: OutcomeStatus,
    ) -> Result<GovernanceOutcome, GovernanceError> {
        let notes = match (&progress.safety, status) {
            (Some(check), OutcomeStatus::Blocked) => check.violations.join("; "),
            _ => progress.clearance.reason.clone(),
        };
        let experience = self.experience(&progress, status, 0.0, &notes, None);
        let experience_id = self.record(experience).await?;
        progress.lifecycle.advance(ActionPhase::Recorded)?;

        let action_id = progress.action.id();
        self.publish(GovernanceEvent::ExperienceRecorded {
            action_id,
            experience_id,
            success: false,
            skill_id: None,
            recorded_at: Utc::now(),
        });
        metrics::counter!("praetor_actions_total", "outcome" => status.as_str()).increment(1);
        info!(action_id = %action_id, outcome = status.as_str(), "Action vetoed and recorded");

        Ok(GovernanceOutcome {
            action_id,
            status,
            phases: progress.lifecycle.history().to_vec(),
            clearance: progress.clearance,
            safety: progress.safety,
            sandboxed: false,
            report: None,
            routing: None,
            experience_id,
            skill_id: None,
        })
    }

    async fn conclude_executed(
        &self,
        mut progress: Progress<'_>,
        step: PlanStep,
        report: ExecutionReport,
        routing: Option<RoutingDecision>,
    ) -> Result<GovernanceOutcome, GovernanceError> {
        let status = if report.success {
            OutcomeStatus::Succeeded
        } else {
            OutcomeStatus::Failed
        };
        let notes = report.output.clone().unwrap_or_default();
        let experience = self.experience(&progress, status, report.quality_score, &notes, routing.as_ref());
        let tags: Vec<String> = experience.tags().iter().cloned().collect();
        let experience_id = self.record(experience).await?;
        progress.lifecycle.advance(ActionPhase::Recorded)?;

        let skill_id = self
            .track_skill(&mut progress, &step, &report, routing.as_ref(), experience_id, tags)
            .await;

        let action_id = progress.action.id();
        self.publish(GovernanceEvent::ExperienceRecorded {
            action_id,
            experience_id,
            success: report.success,
            skill_id,
            recorded_at: Utc::now(),
        });
        metrics::counter!("praetor_actions_total", "outcome" => status.as_str()).increment(1);
        info!(
            action_id = %action_id,
            outcome = status.as_str(),
            experience_id = %experience_id,
            sandboxed = progress.sandboxed,
            "Action executed and recorded"
        );

        Ok(GovernanceOutcome {
            action_id,
            status,
            phases: progress.lifecycle.history().to_vec(),
            clearance: progress.clearance,
            safety: progress.safety,
            sandboxed: progress.sandboxed,
            report: Some(report),
            routing,
            experience_id,
            skill_id,
        })
    }

    /// Skill usage and extraction. Failures are logged, never surfaced.
    async fn track_skill(
        &self,
        progress: &mut Progress<'_>,
        step: &PlanStep,
        report: &ExecutionReport,
        routing: Option<&RoutingDecision>,
        experience_id: ExperienceId,
        tags: Vec<String>,
    ) -> Option<SkillId> {
        let skills = &self.services.skills;
        let context = progress.context;

        if let Some(raw) = context.attribute(SKILL_ID_ATTRIBUTE) {
            let Ok(uuid) = Uuid::parse_str(raw) else {
                warn!(skill_id = raw, "Ignoring malformed skill id attribute");
                return None;
            };
            let id = SkillId(uuid);
            return match skills.record_execution(id, report.success, report.elapsed_ms).await {
                Ok(skill) => {
                    debug!(skill_id = %id, usage = skill.usage_count(), "Skill usage recorded");
                    Some(id)
                }
                Err(e) => {
                    warn!(skill_id = %id, error = %e, "Failed to record skill usage");
                    None
                }
            };
        }

        let qualifies = report.success
            && report.quality_score >= self.spec.skills.extraction_quality_floor
            && !progress.sandboxed
            && routing.is_none();
        if !qualifies {
            return None;
        }

        let name = context
            .attribute(SKILL_NAME_ATTRIBUTE)
            .unwrap_or(progress.action.name())
            .to_string();

        match skills.find_by_name(&name).await {
            Ok(Some(existing)) => return self.record_reuse(existing.id, report).await,
            Ok(None) => {}
            Err(e) => {
                warn!(skill = %name, error = %e, "Skill lookup failed, skipping extraction");
                return None;
            }
        }

        let goal = context
            .goal
            .clone()
            .unwrap_or_else(|| progress.action.name().to_string());
        let mut record = ExecutionRecord::new(goal.clone(), vec![step.to_skill_step()], true)
            .with_elapsed_ms(report.elapsed_ms)
            .with_quality(report.quality_score)
            .with_context(context.to_string())
            .with_tags(tags)
            .with_experience(experience_id);
        if let Some(category) = context.attribute(SKILL_CATEGORY_ATTRIBUTE) {
            record = record.with_category(category);
        }

        match skills.extract_skill(&record, &name, &goal).await {
            Ok(skill) => {
                if let Err(e) = progress.lifecycle.advance(ActionPhase::SkillExtracted) {
                    warn!(error = %e, "Unexpected lifecycle state after extraction");
                }
                Some(skill.id)
            }
            Err(CortexError::AlreadyExists { .. }) => {
                debug!(skill = %name, "Skill extracted concurrently, recording reuse");
                match skills.find_by_name(&name).await {
                    Ok(Some(existing)) => self.record_reuse(existing.id, report).await,
                    Ok(None) => None,
                    Err(e) => {
                        warn!(skill = %name, error = %e, "Skill lookup failed after extraction race");
                        None
                    }
                }
            }
            Err(e) => {
                warn!(skill = %name, error = %e, "Skill extraction failed");
                None
            }
        }
    }

    async fn record_reuse(&self, id: SkillId, report: &ExecutionReport) -> Option<SkillId> {
        match self
            .services
            .skills
            .record_execution(id, true, report.elapsed_ms)
            .await
        {
            Ok(_) => Some(id),
            Err(e) => {
                warn!(skill_id = %id, error = %e, "Failed to record skill reuse");
                None
            }
        }
    }
}
