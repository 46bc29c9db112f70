// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Ethics Application Service
//!
//! Screens actions, plans, goals, skill usage, research and
//! self-modification requests against [`CORE_PRINCIPLES`].
//!
//! Built-in screening is a pair of lazily compiled regex tables over
//! normalised text: harmful intents are denied, sensitive operations need a
//! human approval. Additional [`EthicalRule`]s can be plugged in; a rule that
//! errors is treated as a denial.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, warn};

use crate::domain::action::{
    ActionContext, Goal, ModificationTarget, Plan, PlanStep, ProposedAction, ResearchActivity,
    SelfModificationRequest, SkillUsage,
};
use crate::domain::ethics::{
    AuditSink, ConcernSeverity, EthicalClearance, EthicalConcern, EthicalPrinciple,
    CORE_PRINCIPLES,
};

#[async_trait]
pub trait EthicsFramework: Send + Sync {
    async fn evaluate_action(&self, action: &ProposedAction, context: &ActionContext) -> EthicalClearance;
    async fn evaluate_plan(&self, plan: &Plan, context: &ActionContext) -> EthicalClearance;
    async fn evaluate_goal(&self, goal: &Goal, context: &ActionContext) -> EthicalClearance;
    async fn evaluate_skill_usage(&self, usage: &SkillUsage, context: &ActionContext) -> EthicalClearance;
    async fn evaluate_research(&self, research: &ResearchActivity, context: &ActionContext) -> EthicalClearance;
    async fn evaluate_self_modification(
        &self,
        request: &SelfModificationRequest,
        context: &ActionContext,
    ) -> EthicalClearance;

    fn core_principles(&self) -> &'static [EthicalPrinciple] {
        &CORE_PRINCIPLES
    }

    /// Fire-and-forget; never fails the caller.
    async fn report_ethical_concern(&self, concern: EthicalConcern, context: &ActionContext);
}

/// What a rule is asked to judge.
#[derive(Debug, Clone, Copy)]
pub enum EthicalSubject<'a> {
    Action(&'a ProposedAction),
    Step(&'a PlanStep),
    Goal(&'a Goal),
    SkillUsage(&'a SkillUsage),
    Research(&'a ResearchActivity),
    SelfModification(&'a SelfModificationRequest),
}

impl EthicalSubject<'_> {
    /// Lowercase text with every non-alphanumeric run folded to one space,
    /// so `delete_all_files` reads as `delete all files`.
    pub fn normalized_text(&self) -> String {
        let raw = match self {
            EthicalSubject::Action(action) => params_text(action.name(), action.parameters()),
            EthicalSubject::Step(step) => params_text(&step.action, &step.parameters),
            EthicalSubject::Goal(goal) => goal.description.clone(),
            EthicalSubject::SkillUsage(usage) => format!("{} {}", usage.skill_name, usage.purpose),
            EthicalSubject::Research(research) => {
                format!("{} {}", research.topic, research.methods.join(" "))
            }
            EthicalSubject::SelfModification(request) => {
                format!("{} {}", request.description, request.justification)
            }
        };
        normalize(&raw)
    }
}

fn params_text(name: &str, parameters: &[(String, String)]) -> String {
    let mut text = name.to_string();
    for (key, value) in parameters {
        text.push(' ');
        text.push_str(key);
        text.push(' ');
        text.push_str(value);
    }
    text
}

fn normalize(raw: &str) -> String {
    raw.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pluggable policy check. `Ok(None)` means the rule has no opinion.
pub trait EthicalRule: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(
        &self,
        subject: &EthicalSubject<'_>,
        context: &ActionContext,
    ) -> anyhow::Result<Option<EthicalClearance>>;
}

/// A screening regex. `pattern` is `None` when the literal failed to
/// compile; an unavailable pattern matches everything so the table fails
/// closed instead of silently shrinking.
struct ScreeningPattern {
    pattern: Option<Regex>,
    principle: &'static str,
    reason: &'static str,
}

impl ScreeningPattern {
    fn new(pattern: &str, principle: &'static str, reason: &'static str) -> Self {
        let pattern = Regex::new(pattern)
            .map_err(|e| error!(error = %e, pattern, "Invalid screening pattern, screening fails closed"))
            .ok();
        Self {
            pattern,
            principle,
            reason,
        }
    }

    fn is_match(&self, text: &str) -> bool {
        self.pattern.as_ref().map_or(true, |re| re.is_match(text))
    }

    fn reason(&self) -> &'static str {
        if self.pattern.is_some() {
            self.reason
        } else {
            "screening pattern unavailable"
        }
    }
}

static HARM_PATTERNS: Lazy<Vec<ScreeningPattern>> = Lazy::new(|| {
    vec![
        ScreeningPattern::new(
            r"\b(exfiltrat\w*|ransomware|malware|keylogger|ddos)\b",
            "do_no_harm",
            "matches a known attack technique",
        ),
        ScreeningPattern::new(r"\b(wipe|destroy)\b", "do_no_harm", "irreversibly destroys data or systems"),
        ScreeningPattern::new(r"\bdelete all\b", "do_no_harm", "bulk deletion of everything in scope"),
        ScreeningPattern::new(
            r"\b(disable|bypass|circumvent)( the)? (safety|oversight|audit|logging|monitoring|guardrails?)\b",
            "human_oversight",
            "weakens human oversight of the agent",
        ),
        ScreeningPattern::new(
            r"\b(harm|hurt|kill|injure)\w* (\w+ )?(humans?|users?|people|persons?)\b",
            "do_no_harm",
            "intends harm to people",
        ),
    ]
});

static SENSITIVE_PATTERNS: Lazy<Vec<ScreeningPattern>> = Lazy::new(|| {
    vec![
        ScreeningPattern::new(
            r"\b(transfer|payment|pay|purchase|buy)\b",
            "accountability",
            "moves money on someone's behalf",
        ),
        ScreeningPattern::new(
            r"\bsend( an)? emails?\b",
            "respect_autonomy",
            "communicates on someone's behalf",
        ),
        ScreeningPattern::new(
            r"\b(publish|production)\b",
            "accountability",
            "has externally visible effects",
        ),
        ScreeningPattern::new(
            r"\b(credentials?|passwords?|secrets?|api keys?)\b",
            "privacy",
            "touches credentials",
        ),
        ScreeningPattern::new(
            r"\b(personal data|pii|social security)\b",
            "privacy",
            "touches personal data",
        ),
    ]
});

fn screen(text: &str) -> EthicalClearance {
    screen_with(&HARM_PATTERNS, &SENSITIVE_PATTERNS, text)
}

fn screen_with(harm: &[ScreeningPattern], sensitive: &[ScreeningPattern], text: &str) -> EthicalClearance {
    if let Some(hit) = harm.iter().find(|p| p.is_match(text)) {
        return EthicalClearance::denied(hit.reason()).with_principle(hit.principle);
    }
    if let Some(hit) = sensitive.iter().find(|p| p.is_match(text)) {
        return EthicalClearance::requires_approval(hit.reason()).with_principle(hit.principle);
    }
    EthicalClearance::permitted("no ethical concerns identified")
}

pub struct StandardEthicsFramework {
    audit_sink: Arc<dyn AuditSink>,
    rules: Vec<Box<dyn EthicalRule>>,
}

impl StandardEthicsFramework {
    pub fn new(audit_sink: Arc<dyn AuditSink>) -> Self {
        Self {
            audit_sink,
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: Box<dyn EthicalRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Built-in screening followed by every plugged rule, most restrictive wins.
    fn evaluate_subject(&self, subject: &EthicalSubject<'_>, context: &ActionContext) -> EthicalClearance {
        let mut clearance = screen(&subject.normalized_text());
        for rule in &self.rules {
            let outcome = match rule.evaluate(subject, context) {
                Ok(Some(rule_clearance)) => rule_clearance,
                Ok(None) => continue,
                Err(e) => {
                    error!(rule = rule.name(), error = %e, "Ethical rule failed, denying");
                    EthicalClearance::denied(format!("rule '{}' failed to evaluate", rule.name()))
                        .with_principle("accountability")
                }
            };
            clearance = clearance.combine(outcome);
        }
        clearance
    }

    fn evaluate_steps<'a, I>(&self, steps: I, context: &ActionContext, mut clearance: EthicalClearance) -> EthicalClearance
    where
        I: IntoIterator<Item = &'a PlanStep>,
    {
        for step in steps {
            clearance = clearance.combine(self.evaluate_subject(&EthicalSubject::Step(step), context));
        }
        clearance
    }
}

#[async_trait]
impl EthicsFramework for StandardEthicsFramework {
    async fn evaluate_action(&self, action: &ProposedAction, context: &ActionContext) -> EthicalClearance {
        let clearance = self.evaluate_subject(&EthicalSubject::Action(action), context);
        debug!(
            action = action.name(),
            verdict = clearance.verdict.as_str(),
            "Action evaluated"
        );

        if clearance.is_denied() {
            let concern = EthicalConcern::new(
                format!("denied '{}': {}", action.name(), clearance.reason),
                ConcernSeverity::High,
            )
            .for_action(action.name());
            self.audit_sink.record_concern(&concern, context);
        }
        clearance
    }

    async fn evaluate_plan(&self, plan: &Plan, context: &ActionContext) -> EthicalClearance {
        let goal = self.evaluate_subject(&EthicalSubject::Goal(&plan.goal), context);
        self.evaluate_steps(&plan.steps, context, goal)
    }

    async fn evaluate_goal(&self, goal: &Goal, context: &ActionContext) -> EthicalClearance {
        self.evaluate_subject(&EthicalSubject::Goal(goal), context)
    }

    async fn evaluate_skill_usage(&self, usage: &SkillUsage, context: &ActionContext) -> EthicalClearance {
        let purpose = self.evaluate_subject(&EthicalSubject::SkillUsage(usage), context);
        self.evaluate_steps(&usage.steps, context, purpose)
    }

    async fn evaluate_research(&self, research: &ResearchActivity, context: &ActionContext) -> EthicalClearance {
        let mut clearance = self.evaluate_subject(&EthicalSubject::Research(research), context);
        if research.involves_human_subjects {
            clearance = clearance.combine(
                EthicalClearance::requires_approval("research involves human subjects")
                    .with_principle("respect_autonomy"),
            );
        }
        if research.collects_personal_data {
            clearance = clearance.combine(
                EthicalClearance::requires_approval("research collects personal data")
                    .with_principle("privacy"),
            );
        }
        clearance
    }

    async fn evaluate_self_modification(
        &self,
        request: &SelfModificationRequest,
        context: &ActionContext,
    ) -> EthicalClearance {
        let floor = if request.justification.trim().is_empty() {
            EthicalClearance::denied("self-modification without justification")
                .with_principle("accountability")
        } else {
            let target = match request.target {
                ModificationTarget::EthicsPolicy | ModificationTarget::SafetyPolicy => {
                    "self-modification of a governing policy"
                }
                _ => "self-modification is never auto-approved",
            };
            EthicalClearance::requires_approval(target).with_principle("human_oversight")
        };

        let clearance = floor.combine(self.evaluate_subject(&EthicalSubject::SelfModification(request), context));
        if clearance.is_denied() {
            warn!(target = ?request.target, reason = %clearance.reason, "Self-modification denied");
        }
        clearance
    }

    async fn report_ethical_concern(&self, concern: EthicalConcern, context: &ActionContext) {
        self.audit_sink.record_concern(&concern, context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ethics::EthicalVerdict;
    use crate::domain::permission::PermissionLevel;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        concerns: Mutex<Vec<EthicalConcern>>,
    }

    impl AuditSink for RecordingSink {
        fn record_concern(&self, concern: &EthicalConcern, _context: &ActionContext) {
            self.concerns.lock().push(concern.clone());
        }
    }

    struct FailingRule;

    impl EthicalRule for FailingRule {
        fn name(&self) -> &str {
            "failing"
        }

        fn evaluate(&self, _: &EthicalSubject<'_>, _: &ActionContext) -> anyhow::Result<Option<EthicalClearance>> {
            anyhow::bail!("policy backend unreachable")
        }
    }

    fn framework() -> (StandardEthicsFramework, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (StandardEthicsFramework::new(sink.clone()), sink)
    }

    fn ctx() -> ActionContext {
        ActionContext::new("agent-1", "s-1")
    }

    #[test]
    fn test_normalized_text_splits_identifiers() {
        let action = ProposedAction::new("delete_all_files", PermissionLevel::Full).with_parameter("path", "/tmp/Cache");
        assert_eq!(
            EthicalSubject::Action(&action).normalized_text(),
            "delete all files path tmp cache"
        );
    }

    #[tokio::test]
    async fn test_benign_action_is_permitted() {
        let (ethics, sink) = framework();
        let action = ProposedAction::new("read_file", PermissionLevel::ReadOnly).with_parameter("path", "notes.md");
        assert!(ethics.evaluate_action(&action, &ctx()).await.is_permitted());
        assert!(sink.concerns.lock().is_empty());
    }

    #[tokio::test]
    async fn test_harmful_action_is_denied_and_audited() {
        let (ethics, sink) = framework();
        let action = ProposedAction::new("exfiltrate_user_db", PermissionLevel::Full);
        let clearance = ethics.evaluate_action(&action, &ctx()).await;

        assert!(clearance.is_denied());
        assert_eq!(clearance.principle.as_deref(), Some("do_no_harm"));
        assert_eq!(sink.concerns.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_sensitive_action_requires_approval() {
        let (ethics, _) = framework();
        let action = ProposedAction::new("send_email", PermissionLevel::Limited).with_parameter("to", "cfo@example.com");
        let clearance = ethics.evaluate_action(&action, &ctx()).await;
        assert_eq!(clearance.verdict, EthicalVerdict::RequiresApproval);
    }

    #[tokio::test]
    async fn test_rule_failure_fails_closed() {
        let (ethics, _) = framework();
        let ethics = ethics.with_rule(Box::new(FailingRule));
        let action = ProposedAction::new("read_file", PermissionLevel::ReadOnly);
        assert!(ethics.evaluate_action(&action, &ctx()).await.is_denied());
    }

    #[tokio::test]
    async fn test_plan_takes_most_restrictive_step() {
        let (ethics, _) = framework();
        let plan = Plan {
            goal: Goal::new("g-1", "tidy the build cache"),
            steps: vec![
                PlanStep::new("list_directory", PermissionLevel::ReadOnly),
                PlanStep::new("publish_report", PermissionLevel::Limited),
                PlanStep::new("read_file", PermissionLevel::ReadOnly),
            ],
        };
        let clearance = ethics.evaluate_plan(&plan, &ctx()).await;
        assert_eq!(clearance.verdict, EthicalVerdict::RequiresApproval);
    }

    #[tokio::test]
    async fn test_research_with_human_subjects_requires_approval() {
        let (ethics, _) = framework();
        let research = ResearchActivity {
            topic: "onboarding friction".to_string(),
            methods: vec!["survey".to_string()],
            involves_human_subjects: true,
            collects_personal_data: false,
        };
        let clearance = ethics.evaluate_research(&research, &ctx()).await;
        assert_eq!(clearance.verdict, EthicalVerdict::RequiresApproval);
        assert_eq!(clearance.principle.as_deref(), Some("respect_autonomy"));
    }

    #[tokio::test]
    async fn test_self_modification_is_never_permitted() {
        let (ethics, _) = framework();
        let benign = SelfModificationRequest {
            target: ModificationTarget::Prompt,
            description: "shorten the planning prompt".to_string(),
            justification: "reduces latency".to_string(),
        };
        assert_eq!(
            ethics.evaluate_self_modification(&benign, &ctx()).await.verdict,
            EthicalVerdict::RequiresApproval
        );

        let hostile = SelfModificationRequest {
            target: ModificationTarget::SafetyPolicy,
            description: "disable safety checks".to_string(),
            justification: "they slow me down".to_string(),
        };
        assert!(ethics.evaluate_self_modification(&hostile, &ctx()).await.is_denied());

        let unjustified = SelfModificationRequest {
            target: ModificationTarget::Code,
            description: "refactor".to_string(),
            justification: "  ".to_string(),
        };
        assert!(ethics.evaluate_self_modification(&unjustified, &ctx()).await.is_denied());
    }

    #[tokio::test]
    async fn test_report_concern_reaches_sink() {
        let (ethics, sink) = framework();
        ethics
            .report_ethical_concern(EthicalConcern::new("odd request", ConcernSeverity::Low), &ctx())
            .await;
        assert_eq!(sink.concerns.lock().len(), 1);
        assert_eq!(ethics.core_principles().len(), 5);
    }

    #[test]
    fn test_builtin_screening_patterns_compile() {
        assert!(HARM_PATTERNS.iter().all(|p| p.pattern.is_some()));
        assert!(SENSITIVE_PATTERNS.iter().all(|p| p.pattern.is_some()));
    }

    #[test]
    fn test_broken_harm_pattern_fails_closed() {
        let harm = vec![ScreeningPattern::new(r"(unclosed", "do_no_harm", "never compiles")];
        let clearance = screen_with(&harm, &[], "read notes md");
        assert!(clearance.is_denied());
        assert_eq!(clearance.reason, "screening pattern unavailable");

        let sensitive = vec![ScreeningPattern::new(r"[", "privacy", "never compiles")];
        assert_eq!(
            screen_with(&[], &sensitive, "read notes md").verdict,
            EthicalVerdict::RequiresApproval
        );
    }

    #[tokio::test]
    async fn test_goal_screening() {
        let (ethics, _) = framework();
        let benign = Goal::new("g-1", "summarize the weekly metrics");
        assert!(ethics.evaluate_goal(&benign, &ctx()).await.is_permitted());

        let harmful = Goal::new("g-2", "Wipe the staging cluster");
        let clearance = ethics.evaluate_goal(&harmful, &ctx()).await;
        assert!(clearance.is_denied());
        assert_eq!(clearance.principle.as_deref(), Some("do_no_harm"));
    }

    #[tokio::test]
    async fn test_skill_usage_with_harmful_step_is_denied() {
        let (ethics, _) = framework();
        let clean = SkillUsage {
            skill_name: "rotate_logs".to_string(),
            purpose: "keep disk usage bounded".to_string(),
            steps: vec![
                PlanStep::new("list_directory", PermissionLevel::ReadOnly),
                PlanStep::new("read_file", PermissionLevel::ReadOnly),
            ],
        };
        assert!(ethics.evaluate_skill_usage(&clean, &ctx()).await.is_permitted());

        let tainted = SkillUsage {
            steps: vec![
                PlanStep::new("list_directory", PermissionLevel::ReadOnly),
                PlanStep::new("install_keylogger", PermissionLevel::Full),
            ],
            ..clean
        };
        assert!(ethics.evaluate_skill_usage(&tainted, &ctx()).await.is_denied());
    }
}
