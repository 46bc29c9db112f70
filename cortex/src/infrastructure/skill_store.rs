// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory skill repository backed by `DashMap`.
//!
//! Updates go through [`SkillRepository::compare_and_swap`]; the entry lock
//! held by `get_mut` makes the version check and the write a single step.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::{AgentSkill, RepositoryError, SkillId};
use super::repository::SkillRepository;

#[derive(Default)]
pub struct InMemorySkillRepository {
    skills: DashMap<SkillId, AgentSkill>,
}

impl InMemorySkillRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

#[async_trait]
impl SkillRepository for InMemorySkillRepository {
    async fn insert(&self, skill: AgentSkill) -> Result<(), RepositoryError> {
        match self.skills.entry(skill.id) {
            Entry::Occupied(_) => Err(RepositoryError::Duplicate(skill.id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(skill);
                Ok(())
            }
        }
    }

    async fn find_by_id(&self, id: SkillId) -> Result<Option<AgentSkill>, RepositoryError> {
        Ok(self.skills.get(&id).map(|s| s.value().clone()))
    }

    async fn list_all(&self) -> Result<Vec<AgentSkill>, RepositoryError> {
        Ok(self.skills.iter().map(|s| s.value().clone()).collect())
    }

    async fn remove(&self, id: SkillId) -> Result<Option<AgentSkill>, RepositoryError> {
        Ok(self.skills.remove(&id).map(|(_, skill)| skill))
    }

    async fn compare_and_swap(
        &self,
        skill: AgentSkill,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        let mut current = self
            .skills
            .get_mut(&skill.id)
            .ok_or_else(|| RepositoryError::NotFound(skill.id.to_string()))?;

        if current.version() != expected_version {
            return Err(RepositoryError::Conflict {
                expected: expected_version,
                found: current.version(),
            });
        }
        *current = skill;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SkillStep;

    fn skill() -> AgentSkill {
        AgentSkill::new("rotate-keys", "security", vec![SkillStep::new("vault.rotate")])
    }

    #[tokio::test]
    async fn test_cas_rejects_stale_version() {
        let repo = InMemorySkillRepository::new();
        let original = skill();
        repo.insert(original.clone()).await.unwrap();

        let mut first = original.clone();
        first.record_execution(true, 10);
        repo.compare_and_swap(first, 0).await.unwrap();

        let mut stale = original;
        stale.record_execution(false, 10);
        let err = repo.compare_and_swap(stale, 0).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict { expected: 0, found: 1 }));

        let stored = repo.find_by_id(skill_id_of(&repo).await).await.unwrap().unwrap();
        assert_eq!(stored.success_rate(), 1.0);
    }

    #[tokio::test]
    async fn test_cas_on_missing_skill() {
        let repo = InMemorySkillRepository::new();
        let err = repo.compare_and_swap(skill(), 0).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_insert_duplicate() {
        let repo = InMemorySkillRepository::new();
        let s = skill();
        repo.insert(s.clone()).await.unwrap();
        assert!(matches!(repo.insert(s).await, Err(RepositoryError::Duplicate(_))));
    }

    async fn skill_id_of(repo: &InMemorySkillRepository) -> SkillId {
        repo.list_all().await.unwrap()[0].id
    }
}
