// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory experience arena.
//!
//! A single `RwLock` guards both the insertion-ordered log and the id index,
//! so every write is linearizable and readers always see a consistent
//! snapshot.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::{Experience, ExperienceId, RepositoryError};
use super::repository::ExperienceRepository;

#[derive(Default)]
struct Arena {
    next_seq: u64,
    log: BTreeMap<u64, Experience>,
    index: HashMap<ExperienceId, u64>,
}

#[derive(Default)]
pub struct InMemoryExperienceRepository {
    arena: RwLock<Arena>,
}

impl InMemoryExperienceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.arena.read().log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ExperienceRepository for InMemoryExperienceRepository {
    async fn insert(&self, experience: Experience) -> Result<(), RepositoryError> {
        let mut arena = self.arena.write();
        if arena.index.contains_key(&experience.id()) {
            return Err(RepositoryError::Duplicate(experience.id().to_string()));
        }
        let seq = arena.next_seq;
        arena.next_seq += 1;
        arena.index.insert(experience.id(), seq);
        arena.log.insert(seq, experience);
        Ok(())
    }

    async fn find_by_id(&self, id: ExperienceId) -> Result<Option<Experience>, RepositoryError> {
        let arena = self.arena.read();
        Ok(arena.index.get(&id).and_then(|seq| arena.log.get(seq)).cloned())
    }

    async fn remove(&self, id: ExperienceId) -> Result<Option<Experience>, RepositoryError> {
        let mut arena = self.arena.write();
        Ok(match arena.index.remove(&id) {
            Some(seq) => arena.log.remove(&seq),
            None => None,
        })
    }

    async fn list_all(&self) -> Result<Vec<Experience>, RepositoryError> {
        Ok(self.arena.read().log.values().cloned().collect())
    }

    async fn remove_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut arena = self.arena.write();
        let expired: Vec<(u64, ExperienceId)> = arena
            .log
            .iter()
            .filter(|(_, e)| e.timestamp() < cutoff)
            .map(|(seq, e)| (*seq, e.id()))
            .collect();

        for (seq, id) in &expired {
            arena.log.remove(seq);
            arena.index.remove(id);
        }
        Ok(expired.len())
    }

    async fn clear(&self) -> Result<usize, RepositoryError> {
        let mut arena = self.arena.write();
        let removed = arena.log.len();
        arena.log.clear();
        arena.index.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Verification;
    use chrono::Duration;

    fn experience(goal: &str) -> Experience {
        Experience::new(goal, "ctx", true, Verification::new(1.0))
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let repo = InMemoryExperienceRepository::new();
        for goal in ["first", "second", "third"] {
            repo.insert(experience(goal)).await.unwrap();
        }

        let goals: Vec<String> = repo
            .list_all()
            .await
            .unwrap()
            .iter()
            .map(|e| e.goal().to_string())
            .collect();
        assert_eq!(goals, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let repo = InMemoryExperienceRepository::new();
        let exp = experience("once");
        repo.insert(exp.clone()).await.unwrap();
        assert!(matches!(repo.insert(exp).await, Err(RepositoryError::Duplicate(_))));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_older_than_keeps_index_consistent() {
        let repo = InMemoryExperienceRepository::new();
        let now = Utc::now();
        let old = experience("old").with_timestamp(now - Duration::days(40));
        let fresh = experience("fresh").with_timestamp(now);
        let old_id = old.id();
        repo.insert(old).await.unwrap();
        repo.insert(fresh).await.unwrap();

        let removed = repo.remove_older_than(now - Duration::days(30)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(repo.find_by_id(old_id).await.unwrap().is_none());
        assert_eq!(repo.len(), 1);
    }
}
