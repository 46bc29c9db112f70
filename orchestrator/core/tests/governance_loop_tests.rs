// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use praetor_core::application::approval::{ApprovalGate, AutoApprove, DenyAllApprovals};
use praetor_core::application::governance::{
    GovernanceLoop, GovernanceServices, OutcomeStatus, SKILL_ID_ATTRIBUTE, SKILL_NAME_ATTRIBUTE,
};
use praetor_core::domain::config::GovernanceConfigSpec;
use praetor_core::domain::error::GovernanceError;
use praetor_core::domain::events::GovernanceEvent;
use praetor_core::domain::executor::{ActionExecutor, ExecutionReport};
use praetor_core::domain::lifecycle::ActionPhase;
use praetor_core::domain::routing::FallbackStrategy;
use praetor_core::infrastructure::audit::TracingAuditSink;
use praetor_core::infrastructure::event_bus::EventBus;
use praetor_core::infrastructure::human_approval::HumanApprovalService;
use praetor_core::{ActionContext, PermissionLevel, PlanStep, ProposedAction};
use praetor_cortex::application::MemoryStore;
use praetor_cortex::{CortexError, Experience, ExperienceId, MemoryQuery, MemoryStatistics};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

struct ScriptedExecutor {
    report: Option<ExecutionReport>,
    calls: AtomicUsize,
    last_step: Mutex<Option<PlanStep>>,
}

impl ScriptedExecutor {
    fn reporting(report: ExecutionReport) -> Arc<Self> {
        Arc::new(Self {
            report: Some(report),
            calls: AtomicUsize::new(0),
            last_step: Mutex::new(None),
        })
    }

    fn erroring() -> Arc<Self> {
        Arc::new(Self {
            report: None,
            calls: AtomicUsize::new(0),
            last_step: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionExecutor for ScriptedExecutor {
    async fn execute(&self, step: &PlanStep, _context: &ActionContext) -> anyhow::Result<ExecutionReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_step.lock() = Some(step.clone());
        match &self.report {
            Some(report) => Ok(report.clone()),
            None => anyhow::bail!("tool process exited with status 137"),
        }
    }
}

/// Fails the first `failures` stores, then delegates.
struct FlakyMemoryStore {
    inner: Arc<dyn MemoryStore>,
    failures_left: AtomicU32,
}

#[async_trait]
impl MemoryStore for FlakyMemoryStore {
    async fn store_experience(&self, experience: Experience) -> Result<ExperienceId, CortexError> {
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(CortexError::Storage("disk quota exceeded".to_string()));
        }
        self.inner.store_experience(experience).await
    }
    async fn query_experiences(&self, query: &MemoryQuery) -> Result<Vec<Experience>, CortexError> {
        self.inner.query_experiences(query).await
    }
    async fn get_experience(&self, id: ExperienceId) -> Result<Experience, CortexError> {
        self.inner.get_experience(id).await
    }
    async fn delete_experience(&self, id: ExperienceId) -> Result<(), CortexError> {
        self.inner.delete_experience(id).await
    }
    async fn get_statistics(&self) -> Result<MemoryStatistics, CortexError> {
        self.inner.get_statistics().await
    }
    async fn clear(&self) -> Result<usize, CortexError> {
        self.inner.clear().await
    }
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, CortexError> {
        self.inner.prune_older_than(cutoff).await
    }
}

async fn services(executor: Arc<dyn ActionExecutor>, approvals: Arc<dyn ApprovalGate>) -> GovernanceServices {
    let event_bus = Arc::new(EventBus::new(256));
    GovernanceServices::in_memory(
        &GovernanceConfigSpec::default(),
        Arc::new(TracingAuditSink::with_event_bus(event_bus.clone())),
        approvals,
        executor,
        event_bus,
    )
    .await
    .unwrap()
}

async fn governance(executor: Arc<dyn ActionExecutor>) -> GovernanceLoop {
    GovernanceLoop::new(
        services(executor, Arc::new(DenyAllApprovals)).await,
        GovernanceConfigSpec::default(),
    )
}

fn ctx() -> ActionContext {
    ActionContext::new("agent-1", "session-1").with_goal("g-1", "summarize release notes")
}

async fn all_experiences(governance: &GovernanceLoop) -> Vec<Experience> {
    governance
        .memory()
        .query_experiences(&MemoryQuery::new(100))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_safe_action_executes_records_and_extracts_skill() {
    let executor = ScriptedExecutor::reporting(ExecutionReport::succeeded(0.9, 0.95).with_elapsed_ms(40));
    let governance = governance(executor.clone()).await;
    let action = ProposedAction::new("read_file", PermissionLevel::ReadOnly).with_parameter("path", "CHANGELOG.md");

    let outcome = governance
        .process(&action, &ctx(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Succeeded);
    assert_eq!(executor.calls(), 1);
    assert!(outcome.routing.is_none());
    assert_eq!(
        outcome.phases,
        vec![
            ActionPhase::Proposed,
            ActionPhase::EthicsChecked,
            ActionPhase::SafetyChecked,
            ActionPhase::Executed,
            ActionPhase::Recorded,
            ActionPhase::SkillExtracted,
        ]
    );

    let experiences = all_experiences(&governance).await;
    assert_eq!(experiences.len(), 1);
    assert!(experiences[0].success());
    assert_eq!(experiences[0].goal(), "summarize release notes");
    assert!(experiences[0].has_tag("action:read_file"));
    assert!(experiences[0].has_tag("outcome:succeeded"));

    let skill = governance
        .skills()
        .get_skill(outcome.skill_id.unwrap())
        .await
        .unwrap();
    assert_eq!(skill.name, "read_file");
    assert_eq!(skill.usage_count(), 0);
    assert_eq!(skill.success_rate(), 1.0);
    assert_eq!(skill.steps[0].action, "read_file");
    assert_eq!(skill.source_experience, Some(outcome.experience_id));
}

#[tokio::test]
async fn test_denied_action_records_one_failed_experience() {
    let executor = ScriptedExecutor::reporting(ExecutionReport::succeeded(1.0, 1.0));
    let governance = governance(executor.clone()).await;
    let action = ProposedAction::new("exfiltrate_customer_table", PermissionLevel::Full);

    let outcome = governance
        .process(&action, &ctx(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Denied);
    assert_eq!(executor.calls(), 0);
    assert_eq!(
        outcome.phases,
        vec![ActionPhase::Proposed, ActionPhase::Denied, ActionPhase::Recorded]
    );

    let stats = governance.memory().get_statistics().await.unwrap();
    assert_eq!(stats.total_experiences, 1);
    assert_eq!(stats.failed_experiences, 1);
    let experiences = all_experiences(&governance).await;
    assert!(experiences[0].has_tag("outcome:denied"));
}

#[tokio::test]
async fn test_blocked_action_records_one_failed_experience() {
    let executor = ScriptedExecutor::reporting(ExecutionReport::succeeded(1.0, 1.0));
    let governance = governance(executor.clone()).await;
    let action = ProposedAction::new("format_volume", PermissionLevel::ReadOnly);

    let outcome = governance
        .process(&action, &ctx(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Blocked);
    assert_eq!(executor.calls(), 0);
    let check = outcome.safety.unwrap();
    assert!(!check.safe);
    assert_eq!(check.required_level, PermissionLevel::Full);
    assert!(check.violations[0].contains("insufficient permission level"));

    let experiences = all_experiences(&governance).await;
    assert_eq!(experiences.len(), 1);
    assert!(!experiences[0].success());
    assert!(experiences[0].has_tag("outcome:blocked"));
}

#[tokio::test]
async fn test_destructive_parameters_block_at_full_level() {
    let executor = ScriptedExecutor::reporting(ExecutionReport::succeeded(1.0, 1.0));
    let governance = governance(executor.clone()).await;
    let action = ProposedAction::new("execute_command", PermissionLevel::Full)
        .with_parameter("command", "mkfs.ext4 /dev/sda1");

    let outcome = governance
        .process(&action, &ctx(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Blocked);
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_permission_gap_is_sandboxed() {
    let executor = ScriptedExecutor::reporting(ExecutionReport::succeeded(0.9, 0.9));
    let governance = governance(executor.clone()).await;
    let action = ProposedAction::new("write_file", PermissionLevel::ReadOnly)
        .with_parameter("path", "out/summary.txt")
        .with_parameter("content", "draft");

    let outcome = governance
        .process(&action, &ctx(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Succeeded);
    assert!(outcome.sandboxed);
    assert!(outcome.phases.contains(&ActionPhase::Sandboxed));
    assert!(outcome.skill_id.is_none());

    let executed = executor.last_step.lock().clone().unwrap();
    assert!(executed.is_sandboxed());
    assert_eq!(executed.required_level, PermissionLevel::ReadOnly);
    assert!(executed.parameters.contains(&("dry_run".to_string(), "true".to_string())));

    let experiences = all_experiences(&governance).await;
    assert!(experiences[0].has_tag("sandboxed"));
}

#[tokio::test]
async fn test_low_confidence_is_routed() {
    let executor = ScriptedExecutor::reporting(ExecutionReport::succeeded(0.45, 0.9));
    let governance = governance(executor.clone()).await;
    let action = ProposedAction::new("search", PermissionLevel::ReadOnly).with_parameter("query", "flaky test");

    let outcome = governance
        .process(&action, &ctx().with_attempt(1), &CancellationToken::new())
        .await
        .unwrap();

    let routing = outcome.routing.clone().unwrap();
    assert_eq!(routing.strategy, FallbackStrategy::DecomposeTask);
    assert!(!routing.should_proceed);
    assert!(outcome.phases.contains(&ActionPhase::Routed));
    assert!(outcome.skill_id.is_none());

    let experiences = all_experiences(&governance).await;
    assert!(experiences[0].has_tag("routed:decompose_task"));
}

#[tokio::test]
async fn test_exhausted_attempts_escalate() {
    let executor = ScriptedExecutor::reporting(ExecutionReport::succeeded(0.6, 0.9));
    let governance = governance(executor).await;
    let action = ProposedAction::new("search", PermissionLevel::ReadOnly);

    let outcome = governance
        .process(&action, &ctx().with_attempt(3), &CancellationToken::new())
        .await
        .unwrap();

    let routing = outcome.routing.unwrap();
    assert_eq!(routing.strategy, FallbackStrategy::EscalateToHuman);
    assert!(routing.requires_human_oversight);
}

#[tokio::test]
async fn test_cancellation_records_nothing() {
    let executor = ScriptedExecutor::reporting(ExecutionReport::succeeded(1.0, 1.0));
    let governance = governance(executor.clone()).await;
    let action = ProposedAction::new("read_file", PermissionLevel::ReadOnly);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = governance.process(&action, &ctx(), &cancel).await;

    assert!(matches!(result, Err(GovernanceError::Cancelled { action_id }) if action_id == action.id()));
    assert_eq!(executor.calls(), 0);
    assert!(all_experiences(&governance).await.is_empty());
}

#[tokio::test]
async fn test_rejected_approval_is_a_denial() {
    let executor = ScriptedExecutor::reporting(ExecutionReport::succeeded(1.0, 1.0));
    let governance = governance(executor.clone()).await;
    let action = ProposedAction::new("send_email", PermissionLevel::Full).with_parameter("to", "team@example.com");

    let outcome = governance
        .process(&action, &ctx(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Denied);
    assert!(outcome.clearance.reason.starts_with("approval rejected"));
    assert_eq!(executor.calls(), 0);
    assert_eq!(governance.memory().get_statistics().await.unwrap().failed_experiences, 1);
}

#[tokio::test]
async fn test_cancellation_during_approval_withdraws_request() {
    let executor = ScriptedExecutor::reporting(ExecutionReport::succeeded(1.0, 1.0));
    let approvals = Arc::new(HumanApprovalService::new(Duration::from_secs(3600)));
    let governance = Arc::new(GovernanceLoop::new(
        services(executor.clone(), approvals.clone()).await,
        GovernanceConfigSpec::default(),
    ));
    let action = ProposedAction::new("send_email", PermissionLevel::Full).with_parameter("to", "team@example.com");
    let cancel = CancellationToken::new();

    let pending = {
        let governance = governance.clone();
        let action = action.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { governance.process(&action, &ctx(), &cancel).await })
    };

    timeout(Duration::from_secs(5), async {
        while approvals.list_pending().await.is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    cancel.cancel();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(GovernanceError::Cancelled { .. })));
    assert!(approvals.list_pending().await.is_empty());
    assert_eq!(executor.calls(), 0);
    assert!(all_experiences(&governance).await.is_empty());
}

#[tokio::test]
async fn test_approved_action_executes() {
    let executor = ScriptedExecutor::reporting(ExecutionReport::succeeded(1.0, 1.0));
    let governance = GovernanceLoop::new(
        services(executor.clone(), Arc::new(AutoApprove)).await,
        GovernanceConfigSpec::default(),
    );
    let action = ProposedAction::new("send_email", PermissionLevel::Full).with_parameter("to", "team@example.com");

    let outcome = governance
        .process(&action, &ctx(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Succeeded);
    assert!(outcome.clearance.requires_approval_gate());
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn test_executor_error_is_recorded_as_failure() {
    let executor = ScriptedExecutor::erroring();
    let governance = governance(executor.clone()).await;
    let action = ProposedAction::new("read_file", PermissionLevel::ReadOnly);

    let outcome = governance
        .process(&action, &ctx(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome.routing.is_some());
    assert!(outcome.skill_id.is_none());
    let experiences = all_experiences(&governance).await;
    assert_eq!(experiences.len(), 1);
    assert!(!experiences[0].success());
    assert_eq!(
        experiences[0].verification().notes(),
        Some("tool process exited with status 137")
    );
}

#[tokio::test]
async fn test_skill_is_reused_by_name_and_tracked_by_id() {
    let executor = ScriptedExecutor::reporting(ExecutionReport::succeeded(0.95, 0.9).with_elapsed_ms(100));
    let governance = governance(executor).await;
    let context = ctx().with_attribute(SKILL_NAME_ATTRIBUTE, "changelog-digest");
    let cancel = CancellationToken::new();

    let first = governance
        .process(&ProposedAction::new("read_file", PermissionLevel::ReadOnly), &context, &cancel)
        .await
        .unwrap();
    let second = governance
        .process(&ProposedAction::new("read_file", PermissionLevel::ReadOnly), &context, &cancel)
        .await
        .unwrap();

    let skill_id = first.skill_id.unwrap();
    assert_eq!(second.skill_id, Some(skill_id));
    assert!(!second.phases.contains(&ActionPhase::SkillExtracted));

    let failing = ScriptedExecutor::reporting(ExecutionReport::failed("file locked"));
    let mut services = governance.services().clone();
    services.executor = failing;
    let governance = GovernanceLoop::new(services, GovernanceConfigSpec::default());
    let tracked = ctx().with_attribute(SKILL_ID_ATTRIBUTE, skill_id.to_string());
    governance
        .process(&ProposedAction::new("read_file", PermissionLevel::ReadOnly), &tracked, &cancel)
        .await
        .unwrap();

    let skill = governance.skills().get_skill(skill_id).await.unwrap();
    assert_eq!(skill.usage_count(), 2);
    assert!((skill.success_rate() - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_recording_retries_then_surfaces_memory_error() {
    let executor = ScriptedExecutor::reporting(ExecutionReport::succeeded(0.9, 0.5));
    let mut services = services(executor, Arc::new(DenyAllApprovals)).await;
    let inner = services.memory.clone();

    services.memory = Arc::new(FlakyMemoryStore {
        inner: inner.clone(),
        failures_left: AtomicU32::new(2),
    });
    let governance = GovernanceLoop::new(services.clone(), GovernanceConfigSpec::default());
    let action = ProposedAction::new("read_file", PermissionLevel::ReadOnly);
    governance
        .process(&action, &ctx(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(inner.get_statistics().await.unwrap().total_experiences, 1);

    services.memory = Arc::new(FlakyMemoryStore {
        inner: inner.clone(),
        failures_left: AtomicU32::new(10),
    });
    let governance = GovernanceLoop::new(services, GovernanceConfigSpec::default());
    let result = governance
        .process(&action, &ctx(), &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(GovernanceError::Memory(CortexError::Storage(_)))));
}

#[tokio::test]
async fn test_action_events_are_published_in_order() {
    let executor = ScriptedExecutor::reporting(ExecutionReport::succeeded(0.9, 0.5));
    let governance = governance(executor).await;
    let action = ProposedAction::new("read_file", PermissionLevel::ReadOnly);
    let mut receiver = governance.event_bus().subscribe_action(action.id());

    governance
        .process(&action, &ctx(), &CancellationToken::new())
        .await
        .unwrap();

    let mut kinds = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(1), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        let done = matches!(event, GovernanceEvent::ExperienceRecorded { .. });
        kinds.push(event);
        if done {
            break;
        }
    }

    assert!(matches!(kinds[0], GovernanceEvent::ActionProposed { .. }));
    assert!(matches!(kinds[1], GovernanceEvent::ActionExecuted { success: true, .. }));
    assert_eq!(kinds.len(), 3);
}

#[tokio::test]
async fn test_concurrent_loops_share_skill_statistics() {
    const AGENTS: usize = 32;

    let executor = ScriptedExecutor::reporting(ExecutionReport::succeeded(0.95, 0.9).with_elapsed_ms(20));
    let governance = Arc::new(governance(executor).await);
    let seed = governance
        .process(
            &ProposedAction::new("read_file", PermissionLevel::ReadOnly),
            &ctx(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let skill_id = seed.skill_id.unwrap();

    let mut handles = Vec::new();
    for agent in 0..AGENTS {
        let governance = governance.clone();
        handles.push(tokio::spawn(async move {
            let context = ActionContext::new(format!("agent-{agent}"), "shared")
                .with_attribute(SKILL_ID_ATTRIBUTE, skill_id.to_string());
            governance
                .process(
                    &ProposedAction::new("read_file", PermissionLevel::ReadOnly),
                    &context,
                    &CancellationToken::new(),
                )
                .await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().status, OutcomeStatus::Succeeded);
    }

    let skill = governance.skills().get_skill(skill_id).await.unwrap();
    assert_eq!(skill.usage_count(), AGENTS as u64);
    assert_eq!(skill.success_rate(), 1.0);
    assert_eq!(
        governance.memory().get_statistics().await.unwrap().total_experiences,
        AGENTS + 1
    );
}

#[tokio::test]
async fn test_manifest_thresholds_drive_the_loop() {
    let manifest = praetor_core::domain::config::GovernanceConfigManifest::from_yaml_str(
        r#"
apiVersion: 100monkeys.ai/v1
kind: GovernanceConfig
metadata:
  name: lenient-staging
spec:
  uncertainty:
    acceptance_threshold: 0.4
    decompose_threshold: 0.3
    clarification_threshold: 0.2
  safety:
    fail_closed_level: elevated
"#,
    )
    .unwrap();
    manifest.validate().unwrap();

    let executor = ScriptedExecutor::reporting(ExecutionReport::succeeded(0.5, 0.9));
    let event_bus = Arc::new(EventBus::new(64));
    let services = GovernanceServices::in_memory(
        &manifest.spec,
        Arc::new(TracingAuditSink::new()),
        Arc::new(DenyAllApprovals),
        executor.clone(),
        event_bus,
    )
    .await
    .unwrap();
    let governance = GovernanceLoop::new(services, manifest.spec.clone());

    let outcome = governance
        .process(
            &ProposedAction::new("rotate_logs", PermissionLevel::Elevated),
            &ctx(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Succeeded);
    assert!(outcome.routing.is_none());
    assert_eq!(outcome.safety.unwrap().required_level, PermissionLevel::Elevated);
    assert_eq!(executor.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_executions_share_one_skill() {
    const AGENTS: usize = 24;

    let executor = ScriptedExecutor::reporting(ExecutionReport::succeeded(0.95, 0.9));
    let governance = Arc::new(governance(executor).await);

    let mut handles = Vec::new();
    for agent in 0..AGENTS {
        let governance = governance.clone();
        handles.push(tokio::spawn(async move {
            let context = ActionContext::new(format!("agent-{agent}"), "shared");
            governance
                .process(
                    &ProposedAction::new("list_directory", PermissionLevel::ReadOnly),
                    &context,
                    &CancellationToken::new(),
                )
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().skill_id.is_some());
    }

    let skills = governance.skills().find_skills(None, &[]).await.unwrap();
    assert_eq!(skills.len(), 1);
    assert_eq!(skills[0].usage_count(), (AGENTS - 1) as u64);
}
