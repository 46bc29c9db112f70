// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the Cortex bounded context
//! Published after each committed memory or skill mutation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::experience::ExperienceId;
use super::skill::SkillId;

/// Cortex domain events
/// These events are published to the EventBus for observability and integration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CortexEvent {
    // Experience memory events

    /// An experience was appended to the store
    ExperienceRecorded {
        experience_id: ExperienceId,
        goal: String,
        success: bool,
        quality_score: f64,
        timestamp: DateTime<Utc>,
    },

    /// An experience was deleted by id
    ExperienceDeleted {
        experience_id: ExperienceId,
        timestamp: DateTime<Utc>,
    },

    /// The whole store was cleared
    MemoryCleared {
        removed: usize,
        timestamp: DateTime<Utc>,
    },

    /// Retention sweep removed experiences older than the cutoff
    ExperiencesPruned {
        count: usize,
        cutoff: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    // Skill registry events

    /// A skill was registered directly
    SkillRegistered {
        skill_id: SkillId,
        name: String,
        category: String,
        timestamp: DateTime<Utc>,
    },

    /// A skill was distilled from a successful execution
    SkillExtracted {
        skill_id: SkillId,
        name: String,
        source_experience: Option<ExperienceId>,
        step_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A skill's running statistics absorbed one more execution
    SkillExecutionRecorded {
        skill_id: SkillId,
        success: bool,
        elapsed_ms: u64,
        old_success_rate: f64,
        new_success_rate: f64,
        usage_count: u64,
        timestamp: DateTime<Utc>,
    },

    /// A skill was explicitly unregistered
    SkillUnregistered {
        skill_id: SkillId,
        timestamp: DateTime<Utc>,
    },
}

impl CortexEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            CortexEvent::ExperienceRecorded { timestamp, .. } => *timestamp,
            CortexEvent::ExperienceDeleted { timestamp, .. } => *timestamp,
            CortexEvent::MemoryCleared { timestamp, .. } => *timestamp,
            CortexEvent::ExperiencesPruned { timestamp, .. } => *timestamp,
            CortexEvent::SkillRegistered { timestamp, .. } => *timestamp,
            CortexEvent::SkillExtracted { timestamp, .. } => *timestamp,
            CortexEvent::SkillExecutionRecorded { timestamp, .. } => *timestamp,
            CortexEvent::SkillUnregistered { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            CortexEvent::ExperienceRecorded { .. } => "experience_recorded",
            CortexEvent::ExperienceDeleted { .. } => "experience_deleted",
            CortexEvent::MemoryCleared { .. } => "memory_cleared",
            CortexEvent::ExperiencesPruned { .. } => "experiences_pruned",
            CortexEvent::SkillRegistered { .. } => "skill_registered",
            CortexEvent::SkillExtracted { .. } => "skill_extracted",
            CortexEvent::SkillExecutionRecorded { .. } => "skill_execution_recorded",
            CortexEvent::SkillUnregistered { .. } => "skill_unregistered",
        }
    }
}
