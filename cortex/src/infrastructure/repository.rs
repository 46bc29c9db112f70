// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository interfaces for Cortex bounded context
//! Defines the contracts for experience and skill storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::domain::{AgentSkill, Experience, ExperienceId, RepositoryError, SkillId};

/// Repository for the append-mostly experience log
#[async_trait]
pub trait ExperienceRepository: Send + Sync {
    /// Append an experience. Ids are unique; a duplicate id is rejected.
    async fn insert(&self, experience: Experience) -> Result<(), RepositoryError>;

    /// Find an experience by its ID
    async fn find_by_id(&self, id: ExperienceId) -> Result<Option<Experience>, RepositoryError>;

    /// Remove an experience, returning it if it existed
    async fn remove(&self, id: ExperienceId) -> Result<Option<Experience>, RepositoryError>;

    /// Consistent snapshot of every experience, oldest insertion first
    async fn list_all(&self) -> Result<Vec<Experience>, RepositoryError>;

    /// Remove every experience whose timestamp is strictly before `cutoff`
    async fn remove_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError>;

    /// Remove everything, returning the number of experiences dropped
    async fn clear(&self) -> Result<usize, RepositoryError>;
}

/// Repository for skills with optimistic concurrency on updates
#[async_trait]
pub trait SkillRepository: Send + Sync {
    /// Store a new skill; fails with `Duplicate` if the id is taken
    async fn insert(&self, skill: AgentSkill) -> Result<(), RepositoryError>;

    /// Find a skill by its ID
    async fn find_by_id(&self, id: SkillId) -> Result<Option<AgentSkill>, RepositoryError>;

    /// Get all skills (for catalog search)
    async fn list_all(&self) -> Result<Vec<AgentSkill>, RepositoryError>;

    /// Remove a skill, returning it if it existed
    async fn remove(&self, id: SkillId) -> Result<Option<AgentSkill>, RepositoryError>;

    /// Replace the stored skill only if its version still equals
    /// `expected_version`. Returns `Conflict` otherwise.
    async fn compare_and_swap(
        &self,
        skill: AgentSkill,
        expected_version: u64,
    ) -> Result<(), RepositoryError>;
}
