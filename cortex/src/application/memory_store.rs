// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Memory Store - durable log of past executions
//!
//! Accepts every experience unconditionally. Failed executions are stored with
//! the same fidelity as successful ones because they are the learning signal
//! for vetoed and dead-end actions.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Experience recording, filtering and on-demand statistics
//! - **Storage:** Any [`ExperienceRepository`] (in-memory arena by default)

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::application::EventBus;
use crate::domain::{
    CortexError, CortexEvent, Experience, ExperienceId, MemoryQuery, MemoryStatistics,
    RepositoryError,
};
use crate::infrastructure::ExperienceRepository;

#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Append an experience. Never filters on outcome or quality.
    async fn store_experience(&self, experience: Experience) -> Result<ExperienceId, CortexError>;

    /// Conjunctive filter, most-recent-first, truncated to `max_results`.
    async fn query_experiences(&self, query: &MemoryQuery) -> Result<Vec<Experience>, CortexError>;

    async fn get_experience(&self, id: ExperienceId) -> Result<Experience, CortexError>;

    async fn delete_experience(&self, id: ExperienceId) -> Result<(), CortexError>;

    /// Recomputed from the live experience set on every call.
    async fn get_statistics(&self) -> Result<MemoryStatistics, CortexError>;

    /// Drop every experience, returning how many were removed.
    async fn clear(&self) -> Result<usize, CortexError>;

    /// Retention sweep: remove experiences timestamped strictly before `cutoff`.
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, CortexError>;
}

pub struct StandardMemoryStore {
    repository: Arc<dyn ExperienceRepository>,
    event_bus: Arc<dyn EventBus>,
}

impl StandardMemoryStore {
    pub fn new(repository: Arc<dyn ExperienceRepository>, event_bus: Arc<dyn EventBus>) -> Self {
        Self {
            repository,
            event_bus,
        }
    }

    async fn publish(&self, event: CortexEvent) {
        let event_type = event.event_type();
        if let Err(e) = self.event_bus.publish(event).await {
            warn!(event_type, error = %e, "Failed to publish cortex event");
        }
    }
}

#[async_trait]
impl MemoryStore for StandardMemoryStore {
    async fn store_experience(&self, experience: Experience) -> Result<ExperienceId, CortexError> {
        let id = experience.id();
        let event = CortexEvent::ExperienceRecorded {
            experience_id: id,
            goal: experience.goal().to_string(),
            success: experience.success(),
            quality_score: experience.quality_score(),
            timestamp: Utc::now(),
        };

        self.repository.insert(experience).await.map_err(|e| match e {
            RepositoryError::Duplicate(id) => CortexError::AlreadyExists {
                entity: "experience",
                id,
            },
            other => CortexError::from(other),
        })?;

        debug!(experience_id = %id, "Experience stored");
        self.publish(event).await;
        Ok(id)
    }

    async fn query_experiences(&self, query: &MemoryQuery) -> Result<Vec<Experience>, CortexError> {
        // list_all is insertion ordered; reversing before the stable sort puts
        // the latest insertion first among equal timestamps.
        let mut matched: Vec<Experience> = self
            .repository
            .list_all()
            .await?
            .into_iter()
            .rev()
            .filter(|e| query.matches(e))
            .collect();

        matched.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
        matched.truncate(query.max_results);
        Ok(matched)
    }

    async fn get_experience(&self, id: ExperienceId) -> Result<Experience, CortexError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| CortexError::experience_not_found(id))
    }

    async fn delete_experience(&self, id: ExperienceId) -> Result<(), CortexError> {
        if self.repository.remove(id).await?.is_none() {
            return Err(CortexError::experience_not_found(id));
        }

        self.publish(CortexEvent::ExperienceDeleted {
            experience_id: id,
            timestamp: Utc::now(),
        })
        .await;
        Ok(())
    }

    async fn get_statistics(&self) -> Result<MemoryStatistics, CortexError> {
        let experiences = self.repository.list_all().await?;
        Ok(MemoryStatistics::from_experiences(&experiences))
    }

    async fn clear(&self) -> Result<usize, CortexError> {
        let removed = self.repository.clear().await?;
        info!(removed, "Experience memory cleared");
        self.publish(CortexEvent::MemoryCleared {
            removed,
            timestamp: Utc::now(),
        })
        .await;
        Ok(removed)
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, CortexError> {
        let count = self.repository.remove_older_than(cutoff).await?;
        if count > 0 {
            self.publish(CortexEvent::ExperiencesPruned {
                count,
                cutoff,
                timestamp: Utc::now(),
            })
            .await;
        }
        Ok(count)
    }
}
