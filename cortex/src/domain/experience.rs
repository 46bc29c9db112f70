// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Experience Memory Domain
//!
//! An [`Experience`] is the immutable record of one completed execution,
//! successful or not. Failures are stored as faithfully as successes: they are
//! the signal the agent learns vetoes and dead ends from.
//!
//! | Type | Description |
//! |------|-------------|
//! | `Experience` | Immutable execution record (no setters exist) |
//! | `Verification` | Quality assessment attached to an experience |
//! | `MemoryQuery` | Conjunctive filter + result cap |
//! | `MemoryStatistics` | Aggregate view, always derived from the live set |

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExperienceId(pub Uuid);

impl ExperienceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExperienceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExperienceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Quality assessment of an execution, produced by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    quality_score: f64,
    notes: Option<String>,
}

impl Verification {
    /// Scores outside `[0, 1]` are clamped; NaN is treated as zero quality.
    pub fn new(quality_score: f64) -> Self {
        Self {
            quality_score: clamp_unit(quality_score),
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn quality_score(&self) -> f64 {
        self.quality_score
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

/// Immutable record of one completed execution.
///
/// Corrections are made by storing a new experience; nothing in the crate can
/// modify one after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    id: ExperienceId,
    goal: String,
    context: String,
    success: bool,
    verification: Verification,
    timestamp: DateTime<Utc>,
    tags: BTreeSet<String>,
}

impl Experience {
    pub fn new(
        goal: impl Into<String>,
        context: impl Into<String>,
        success: bool,
        verification: Verification,
    ) -> Self {
        Self {
            id: ExperienceId::new(),
            goal: goal.into(),
            context: context.into(),
            success,
            verification,
            timestamp: Utc::now(),
            tags: BTreeSet::new(),
        }
    }

    pub fn with_id(mut self, id: ExperienceId) -> Self {
        self.id = id;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
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

    pub fn id(&self) -> ExperienceId {
        self.id
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn verification(&self) -> &Verification {
        &self.verification
    }

    pub fn quality_score(&self) -> f64 {
        self.verification.quality_score
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Filter over the experience store. All supplied predicates must match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryQuery {
    pub goal_contains: Option<String>,
    pub success: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub max_results: usize,
}

impl MemoryQuery {
    pub fn new(max_results: usize) -> Self {
        Self {
            goal_contains: None,
            success: None,
            since: None,
            until: None,
            tags: Vec::new(),
            max_results,
        }
    }

    pub fn goal_contains(mut self, fragment: impl Into<String>) -> Self {
        self.goal_contains = Some(fragment.into());
        self
    }

    pub fn successful(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    pub fn between(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Goal matching is a case-insensitive substring test; the date range is
    /// inclusive on both ends.
    pub fn matches(&self, experience: &Experience) -> bool {
        if let Some(fragment) = &self.goal_contains {
            if !experience
                .goal()
                .to_lowercase()
                .contains(&fragment.to_lowercase())
            {
                return false;
            }
        }
        if let Some(success) = self.success {
            if experience.success() != success {
                return false;
            }
        }
        if let Some(since) = self.since {
            if experience.timestamp() < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if experience.timestamp() > until {
                return false;
            }
        }
        self.tags.iter().all(|tag| experience.has_tag(tag))
    }
}

/// Aggregate view over the experience store.
///
/// Never cached: it is rebuilt from the live experience set on every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStatistics {
    pub total_experiences: usize,
    pub successful_experiences: usize,
    pub failed_experiences: usize,
    pub distinct_contexts: usize,
    pub distinct_tags: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    pub average_quality: f64,
}

impl MemoryStatistics {
    pub fn from_experiences<'a, I>(experiences: I) -> Self
    where
        I: IntoIterator<Item = &'a Experience>,
    {
        let mut total = 0usize;
        let mut successful = 0usize;
        let mut quality_sum = 0.0;
        let mut contexts: HashSet<&str> = HashSet::new();
        let mut tags: HashSet<&str> = HashSet::new();
        let mut oldest: Option<DateTime<Utc>> = None;
        let mut newest: Option<DateTime<Utc>> = None;

        for experience in experiences {
            total += 1;
            if experience.success() {
                successful += 1;
            }
            quality_sum += experience.quality_score();
            contexts.insert(experience.context());
            tags.extend(experience.tags().iter().map(String::as_str));

            let ts = experience.timestamp();
            oldest = Some(oldest.map_or(ts, |o| o.min(ts)));
            newest = Some(newest.map_or(ts, |n| n.max(ts)));
        }

        Self {
            total_experiences: total,
            successful_experiences: successful,
            failed_experiences: total - successful,
            distinct_contexts: contexts.len(),
            distinct_tags: tags.len(),
            oldest,
            newest,
            average_quality: if total == 0 { 0.0 } else { quality_sum / total as f64 },
        }
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
