// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Skill Registry - catalog of reusable plan fragments
//!
//! Skills are distilled from successful executions and refined by every
//! subsequent use through a weighted-average update of their statistics.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Registration, lookup, similarity matching and usage tracking
//! - **Concurrency:** `record_execution` is an optimistic read-modify-write;
//!   version conflicts are retried up to `max_conflict_retries` times before
//!   `CortexError::ConcurrencyConflict` is surfaced. Registration and
//!   extraction are serialized so skill names stay unique (case-insensitive).

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::EventBus;
use crate::domain::{
    AgentSkill, CortexError, CortexEvent, ExecutionRecord, RepositoryError, SkillId,
};
use crate::infrastructure::SkillRepository;

static TOKEN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[a-z0-9]+").ok());

/// Category assigned to extracted skills when the execution record has none.
pub const DEFAULT_SKILL_CATEGORY: &str = "general";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillRegistryConfig {
    /// Bound on compare-and-swap retries per `record_execution` call.
    pub max_conflict_retries: u32,
    /// Skills scoring below this goal similarity are not returned by
    /// `find_matching_skills`.
    pub min_similarity: f64,
}

impl Default for SkillRegistryConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 64,
            min_similarity: 0.2,
        }
    }
}

#[async_trait]
pub trait SkillRegistry: Send + Sync {
    async fn register_skill(&self, skill: AgentSkill) -> Result<SkillId, CortexError>;

    async fn get_skill(&self, id: SkillId) -> Result<AgentSkill, CortexError>;

    /// Exact (case-insensitive) name lookup.
    async fn find_by_name(&self, name: &str) -> Result<Option<AgentSkill>, CortexError>;

    /// Skills in `category` (if given) carrying every tag in `tags`, best
    /// success rate first.
    async fn find_skills(
        &self,
        category: Option<&str>,
        tags: &[String],
    ) -> Result<Vec<AgentSkill>, CortexError>;

    /// Skills whose name, description or tags resemble `goal`, ranked by
    /// success rate and then by similarity.
    async fn find_matching_skills(
        &self,
        goal: &str,
        context: Option<&str>,
    ) -> Result<Vec<AgentSkill>, CortexError>;

    /// Apply one execution outcome to the skill's running statistics.
    async fn record_execution(
        &self,
        id: SkillId,
        success: bool,
        elapsed_ms: u64,
    ) -> Result<AgentSkill, CortexError>;

    async fn unregister_skill(&self, id: SkillId) -> Result<AgentSkill, CortexError>;

    /// Distil a new skill from a successful execution and register it.
    async fn extract_skill(
        &self,
        record: &ExecutionRecord,
        name: &str,
        description: &str,
    ) -> Result<AgentSkill, CortexError>;
}

pub struct StandardSkillRegistry {
    repository: Arc<dyn SkillRepository>,
    event_bus: Arc<dyn EventBus>,
    config: SkillRegistryConfig,
    registration: Mutex<()>,
}

impl StandardSkillRegistry {
    pub fn new(
        repository: Arc<dyn SkillRepository>,
        event_bus: Arc<dyn EventBus>,
        config: SkillRegistryConfig,
    ) -> Self {
        Self {
            repository,
            event_bus,
            config,
            registration: Mutex::new(()),
        }
    }

    async fn publish(&self, event: CortexEvent) {
        let event_type = event.event_type();
        if let Err(e) = self.event_bus.publish(event).await {
            warn!(event_type, error = %e, "Failed to publish cortex event");
        }
    }

    async fn insert(&self, skill: AgentSkill) -> Result<(), CortexError> {
        let id = skill.id;
        self.repository.insert(skill).await.map_err(|e| match e {
            RepositoryError::Duplicate(_) => CortexError::AlreadyExists {
                entity: "skill",
                id: id.to_string(),
            },
            other => CortexError::from(other),
        })
    }

    /// Insert unless another skill already carries the same name.
    async fn insert_unique(&self, skill: AgentSkill) -> Result<(), CortexError> {
        let _registration = self.registration.lock().await;
        if let Some(existing) = self.find_by_name(&skill.name).await? {
            return Err(CortexError::AlreadyExists {
                entity: "skill named",
                id: existing.name,
            });
        }
        self.insert(skill).await
    }
}

fn tokens(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    match TOKEN.as_ref() {
        Some(token) => token
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect(),
        None => lowered.split_whitespace().map(str::to_string).collect(),
    }
}

/// Similarity of a skill to a goal in `[0, 1]`.
///
/// A substring hit in either direction on the skill name scores 1.0;
/// otherwise the score is the share of goal tokens found in the skill's
/// name, description and tags. Context tokens that hit the category or tags
/// add a small bonus.
fn similarity(skill: &AgentSkill, goal: &str, context: Option<&str>) -> f64 {
    let goal_lower = goal.trim().to_lowercase();
    if goal_lower.is_empty() {
        return 0.0;
    }
    let name_lower = skill.name.to_lowercase();
    if name_lower.contains(&goal_lower) || goal_lower.contains(&name_lower) {
        return 1.0;
    }

    let mut vocabulary = tokens(&skill.name);
    if let Some(description) = &skill.description {
        vocabulary.extend(tokens(description));
    }
    for tag in &skill.tags {
        vocabulary.extend(tokens(tag));
    }

    let goal_tokens = tokens(goal);
    if goal_tokens.is_empty() {
        return 0.0;
    }
    let hits = goal_tokens.iter().filter(|t| vocabulary.contains(*t)).count();
    let mut score = hits as f64 / goal_tokens.len() as f64;

    if let Some(context) = context {
        let mut scope = tokens(&skill.category);
        for tag in &skill.tags {
            scope.extend(tokens(tag));
        }
        let context_tokens = tokens(context);
        if !context_tokens.is_empty() {
            let context_hits = context_tokens.iter().filter(|t| scope.contains(*t)).count();
            score += 0.1 * context_hits as f64 / context_tokens.len() as f64;
        }
    }

    score.min(1.0)
}

#[async_trait]
impl SkillRegistry for StandardSkillRegistry {
    async fn register_skill(&self, skill: AgentSkill) -> Result<SkillId, CortexError> {
        if skill.name.trim().is_empty() {
            return Err(CortexError::InvalidOperation("skill name must not be empty".to_string()));
        }
        if !skill.has_valid_statistics() {
            return Err(CortexError::InvalidOperation(format!(
                "skill {} has out-of-range statistics",
                skill.id
            )));
        }

        let id = skill.id;
        let event = CortexEvent::SkillRegistered {
            skill_id: id,
            name: skill.name.clone(),
            category: skill.category.clone(),
            timestamp: Utc::now(),
        };
        self.insert_unique(skill).await?;

        info!(skill_id = %id, "Skill registered");
        self.publish(event).await;
        Ok(id)
    }

    async fn get_skill(&self, id: SkillId) -> Result<AgentSkill, CortexError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| CortexError::skill_not_found(id))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<AgentSkill>, CortexError> {
        Ok(self
            .repository
            .list_all()
            .await?
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(name)))
    }

    async fn find_skills(
        &self,
        category: Option<&str>,
        tags: &[String],
    ) -> Result<Vec<AgentSkill>, CortexError> {
        let mut skills: Vec<AgentSkill> = self
            .repository
            .list_all()
            .await?
            .into_iter()
            .filter(|s| category.map_or(true, |c| s.category.eq_ignore_ascii_case(c)))
            .filter(|s| tags.iter().all(|t| s.has_tag(t)))
            .collect();

        skills.sort_by(|a, b| {
            b.success_rate()
                .total_cmp(&a.success_rate())
                .then_with(|| b.usage_count().cmp(&a.usage_count()))
        });
        Ok(skills)
    }

    async fn find_matching_skills(
        &self,
        goal: &str,
        context: Option<&str>,
    ) -> Result<Vec<AgentSkill>, CortexError> {
        let mut scored: Vec<(f64, AgentSkill)> = self
            .repository
            .list_all()
            .await?
            .into_iter()
            .map(|s| (similarity(&s, goal, context), s))
            .filter(|(score, _)| *score > 0.0 && *score >= self.config.min_similarity)
            .collect();

        scored.sort_by(|(sa, a), (sb, b)| {
            b.success_rate()
                .total_cmp(&a.success_rate())
                .then_with(|| sb.total_cmp(sa))
                .then_with(|| b.usage_count().cmp(&a.usage_count()))
        });

        debug!(goal, matches = scored.len(), "Skill similarity search");
        Ok(scored.into_iter().map(|(_, s)| s).collect())
    }

    async fn record_execution(
        &self,
        id: SkillId,
        success: bool,
        elapsed_ms: u64,
    ) -> Result<AgentSkill, CortexError> {
        let attempts = self.config.max_conflict_retries.max(1);

        for attempt in 1..=attempts {
            let current = self.get_skill(id).await?;
            let expected_version = current.version();
            let old_success_rate = current.success_rate();

            let mut updated = current;
            updated.record_execution(success, elapsed_ms);

            match self
                .repository
                .compare_and_swap(updated.clone(), expected_version)
                .await
            {
                Ok(()) => {
                    self.publish(CortexEvent::SkillExecutionRecorded {
                        skill_id: id,
                        success,
                        elapsed_ms,
                        old_success_rate,
                        new_success_rate: updated.success_rate(),
                        usage_count: updated.usage_count(),
                        timestamp: Utc::now(),
                    })
                    .await;
                    return Ok(updated);
                }
                Err(RepositoryError::Conflict { expected, found }) => {
                    metrics::counter!("praetor_skill_conflicts_total").increment(1);
                    debug!(skill_id = %id, attempt, expected, found, "Skill version conflict, retrying");
                    tokio::task::yield_now().await;
                }
                Err(RepositoryError::NotFound(_)) => return Err(CortexError::skill_not_found(id)),
                Err(other) => return Err(other.into()),
            }
        }

        warn!(skill_id = %id, attempts, "Skill update abandoned after repeated conflicts");
        Err(CortexError::ConcurrencyConflict {
            entity: "skill",
            id: id.to_string(),
            attempts,
        })
    }

    async fn unregister_skill(&self, id: SkillId) -> Result<AgentSkill, CortexError> {
        let removed = self
            .repository
            .remove(id)
            .await?
            .ok_or_else(|| CortexError::skill_not_found(id))?;

        info!(skill_id = %id, name = %removed.name, "Skill unregistered");
        self.publish(CortexEvent::SkillUnregistered {
            skill_id: id,
            timestamp: Utc::now(),
        })
        .await;
        Ok(removed)
    }

    async fn extract_skill(
        &self,
        record: &ExecutionRecord,
        name: &str,
        description: &str,
    ) -> Result<AgentSkill, CortexError> {
        if !record.success {
            return Err(CortexError::InvalidOperation(format!(
                "cannot extract a skill from failed execution of '{}'",
                record.goal
            )));
        }
        if record.steps.is_empty() {
            return Err(CortexError::InvalidOperation(format!(
                "execution of '{}' has no steps to extract",
                record.goal
            )));
        }
        if name.trim().is_empty() {
            return Err(CortexError::InvalidOperation("skill name must not be empty".to_string()));
        }

        let category = record
            .category
            .clone()
            .unwrap_or_else(|| DEFAULT_SKILL_CATEGORY.to_string());

        let mut skill = AgentSkill::new(name, category, record.steps.clone())
            .with_tags(record.tags.iter().cloned())
            .with_baseline_execution_ms(record.elapsed_ms);
        if !description.is_empty() {
            skill = skill.with_description(description);
        }
        skill.source_experience = record.experience_id;

        self.insert_unique(skill.clone()).await?;

        info!(skill_id = %skill.id, name, steps = skill.steps.len(), "Skill extracted from execution");
        self.publish(CortexEvent::SkillExtracted {
            skill_id: skill.id,
            name: skill.name.clone(),
            source_experience: skill.source_experience,
            step_count: skill.steps.len(),
            timestamp: Utc::now(),
        })
        .await;
        Ok(skill)
    }
}
