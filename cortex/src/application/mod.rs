// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod memory_store;
pub mod skill_registry;
pub mod memory_pruner;

pub use memory_store::{MemoryStore, StandardMemoryStore};
pub use skill_registry::{SkillRegistry, SkillRegistryConfig, StandardSkillRegistry};
pub use memory_pruner::{MemoryPruner, MemoryPrunerConfig};

use anyhow::Result;
use async_trait::async_trait;
use crate::domain::CortexEvent;

/// Sink for cortex domain events.
///
/// Implementations must not block; services publish after the mutation has
/// been committed and only log a failed publication.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: CortexEvent) -> Result<()>;
}
