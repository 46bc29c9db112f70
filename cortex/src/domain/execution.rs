// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};

use super::experience::{clamp_unit, ExperienceId};

/// One step of an executable plan fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillStep {
    pub action: String,
    /// Ordered key/value parameters, preserved exactly as planned.
    pub parameters: Vec<(String, String)>,
    pub description: Option<String>,
}

impl SkillStep {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            parameters: Vec::new(),
            description: None,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((key.into(), value.into()));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// What the executor reports about a completed plan. Skills are extracted
/// from these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub goal: String,
    pub context: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub steps: Vec<SkillStep>,
    pub success: bool,
    pub elapsed_ms: u64,
    pub quality_score: f64,
    pub experience_id: Option<ExperienceId>,
}

impl ExecutionRecord {
    pub fn new(goal: impl Into<String>, steps: Vec<SkillStep>, success: bool) -> Self {
        Self {
            goal: goal.into(),
            context: None,
            category: None,
            tags: Vec::new(),
            steps,
            success,
            elapsed_ms: 0,
            quality_score: if success { 1.0 } else { 0.0 },
            experience_id: None,
        }
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn with_quality(mut self, quality_score: f64) -> Self {
        self.quality_score = clamp_unit(quality_score);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_experience(mut self, experience_id: ExperienceId) -> Self {
        self.experience_id = Some(experience_id);
        self
    }
}
