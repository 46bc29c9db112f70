// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Action Domain
//!
//! Values produced by the planner and inspected by the governance layer.
//! None of these are mutated by governance components: a sandboxed step is a
//! new [`PlanStep`], never an edit of the original.
//!
//! | Type | Description |
//! |------|-------------|
//! | `ProposedAction` | Single action awaiting a governance decision |
//! | `ActionContext` | Situational metadata passed through unchanged |
//! | `PlanStep` | Executable unit handed to the executor |
//! | `Plan` / `Goal` | Planner output evaluated as a whole by ethics |
//! | `SkillUsage`, `ResearchActivity`, `SelfModificationRequest` | Other ethics subjects |

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use praetor_cortex::SkillStep;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::permission::PermissionLevel;
use super::policy::SandboxPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub Uuid);

impl ActionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An action proposed by the planner. Fields are private; the value is built
/// once and then only read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedAction {
    id: ActionId,
    name: String,
    parameters: Vec<(String, String)>,
    requested_level: PermissionLevel,
    proposed_at: DateTime<Utc>,
}

impl ProposedAction {
    pub fn new(name: impl Into<String>, requested_level: PermissionLevel) -> Self {
        Self {
            id: ActionId::new(),
            name: name.into(),
            parameters: Vec::new(),
            requested_level,
            proposed_at: Utc::now(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((key.into(), value.into()));
        self
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[(String, String)] {
        &self.parameters
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn requested_level(&self) -> PermissionLevel {
        self.requested_level
    }

    pub fn proposed_at(&self) -> DateTime<Utc> {
        self.proposed_at
    }

    /// The step the executor would run if the action passes unchanged.
    pub fn to_plan_step(&self) -> PlanStep {
        PlanStep {
            action: self.name.clone(),
            parameters: self.parameters.clone(),
            required_level: self.requested_level,
            sandbox: None,
        }
    }
}

/// Opaque situational metadata. Governance components only ever borrow it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionContext {
    pub agent_id: String,
    pub session_id: String,
    pub goal_id: Option<String>,
    pub goal: Option<String>,
    /// Number of earlier attempts at the same task.
    #[serde(default)]
    pub attempt: u32,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ActionContext {
    pub fn new(agent_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    pub fn with_goal(mut self, goal_id: impl Into<String>, goal: impl Into<String>) -> Self {
        self.goal_id = Some(goal_id.into());
        self.goal = Some(goal.into());
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

impl fmt::Display for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent={} session={}", self.agent_id, self.session_id)?;
        if let Some(goal_id) = &self.goal_id {
            write!(f, " goal={goal_id}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub action: String,
    pub parameters: Vec<(String, String)>,
    pub required_level: PermissionLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<SandboxPolicy>,
}

impl PlanStep {
    pub fn new(action: impl Into<String>, required_level: PermissionLevel) -> Self {
        Self {
            action: action.into(),
            parameters: Vec::new(),
            required_level,
            sandbox: None,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((key.into(), value.into()));
        self
    }

    pub fn is_sandboxed(&self) -> bool {
        self.sandbox.is_some()
    }

    pub fn to_skill_step(&self) -> SkillStep {
        let mut step = SkillStep::new(self.action.clone());
        for (key, value) in &self.parameters {
            step = step.with_parameter(key.clone(), value.clone());
        }
        step
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub description: String,
}

impl Goal {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub goal: Goal,
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillUsage {
    pub skill_name: String,
    pub purpose: String,
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchActivity {
    pub topic: String,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub involves_human_subjects: bool,
    #[serde(default)]
    pub collects_personal_data: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationTarget {
    EthicsPolicy,
    SafetyPolicy,
    RoutingPolicy,
    SkillLibrary,
    Prompt,
    Code,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfModificationRequest {
    pub target: ModificationTarget,
    pub description: String,
    pub justification: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_step_preserves_parameter_order() {
        let action = ProposedAction::new("http.post", PermissionLevel::Elevated)
            .with_parameter("url", "https://example.com")
            .with_parameter("body", "{}");
        let step = action.to_plan_step();

        assert_eq!(step.parameters[0].0, "url");
        assert_eq!(step.parameters[1].0, "body");
        assert_eq!(step.required_level, PermissionLevel::Elevated);
        assert!(!step.is_sandboxed());

        let skill_step = step.to_skill_step();
        assert_eq!(skill_step.action, "http.post");
        assert_eq!(skill_step.parameters, step.parameters);
    }

    #[test]
    fn test_context_display() {
        let ctx = ActionContext::new("agent-7", "s-1").with_goal("g-42", "ship release");
        assert_eq!(ctx.to_string(), "agent=agent-7 session=s-1 goal=g-42");
    }
}
