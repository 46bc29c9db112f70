// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::execution::SkillStep;
use super::experience::ExperienceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkillId(pub Uuid);

impl SkillId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SkillId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A named, reusable plan fragment distilled from a successful execution.
///
/// Usage statistics are private: they only move through
/// [`AgentSkill::record_execution`], so the running averages always reflect
/// the full usage history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSkill {
    pub id: SkillId,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub tags: BTreeSet<String>,
    pub prerequisites: Vec<String>,
    pub steps: Vec<SkillStep>,
    pub source_experience: Option<ExperienceId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    success_rate: f64,
    usage_count: u64,
    average_execution_ms: f64,
    version: u64,
}

impl AgentSkill {
    pub fn new(name: impl Into<String>, category: impl Into<String>, steps: Vec<SkillStep>) -> Self {
        let now = Utc::now();
        Self {
            id: SkillId::new(),
            name: name.into(),
            description: None,
            category: category.into(),
            tags: BTreeSet::new(),
            prerequisites: Vec::new(),
            steps,
            source_experience: None,
            created_at: now,
            updated_at: now,
            success_rate: 1.0,
            usage_count: 0,
            average_execution_ms: 0.0,
            version: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
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

    pub fn with_prerequisites<I, S>(mut self, prerequisites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisites.extend(prerequisites.into_iter().map(Into::into));
        self
    }

    /// Seed the running average execution time. Only meaningful before the
    /// first recorded execution; the weighted update ignores it once
    /// `usage_count` is non-zero.
    pub fn with_baseline_execution_ms(mut self, elapsed_ms: u64) -> Self {
        if self.usage_count == 0 {
            self.average_execution_ms = elapsed_ms as f64;
        }
        self
    }

    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }

    pub fn usage_count(&self) -> u64 {
        self.usage_count
    }

    pub fn average_execution_ms(&self) -> f64 {
        self.average_execution_ms
    }

    /// Optimistic concurrency token, bumped on every recorded execution.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Weighted-average update: `new = (old * n + sample) / (n + 1)`.
    pub fn record_execution(&mut self, success: bool, elapsed_ms: u64) {
        let n = self.usage_count as f64;
        let outcome = if success { 1.0 } else { 0.0 };

        self.success_rate = (self.success_rate * n + outcome) / (n + 1.0);
        self.average_execution_ms = (self.average_execution_ms * n + elapsed_ms as f64) / (n + 1.0);
        self.usage_count += 1;
        self.version += 1;
        self.updated_at = Utc::now();
    }

    /// Statistics must be finite and inside their domains for a skill to be
    /// registrable.
    pub fn has_valid_statistics(&self) -> bool {
        self.success_rate.is_finite()
            && (0.0..=1.0).contains(&self.success_rate)
            && self.average_execution_ms.is_finite()
            && self.average_execution_ms >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill() -> AgentSkill {
        AgentSkill::new("fetch-report", "reporting", vec![SkillStep::new("http.get")])
    }

    #[test]
    fn test_new_skill_starts_unused_and_perfect() {
        let skill = skill();
        assert_eq!(skill.usage_count(), 0);
        assert_eq!(skill.success_rate(), 1.0);
        assert_eq!(skill.version(), 0);
    }

    #[test]
    fn test_first_execution_replaces_initial_rate() {
        let mut skill = skill().with_baseline_execution_ms(900);
        skill.record_execution(false, 100);
        assert_eq!(skill.success_rate(), 0.0);
        assert_eq!(skill.average_execution_ms(), 100.0);
        assert_eq!(skill.usage_count(), 1);
        assert_eq!(skill.version(), 1);
    }

    #[test]
    fn test_weighted_average_update() {
        let mut skill = skill();
        skill.record_execution(true, 100);
        skill.record_execution(false, 300);
        skill.record_execution(true, 200);
        skill.record_execution(true, 400);

        assert_eq!(skill.usage_count(), 4);
        assert!((skill.success_rate() - 0.75).abs() < 1e-12);
        assert!((skill.average_execution_ms() - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_baseline_ignored_after_first_use() {
        let mut skill = skill();
        skill.record_execution(true, 50);
        let skill = skill.with_baseline_execution_ms(10_000);
        assert_eq!(skill.average_execution_ms(), 50.0);
    }
}
