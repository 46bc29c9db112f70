// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared-resource behaviour under concurrent writers.

use std::sync::Arc;

use async_trait::async_trait;
use praetor_cortex::application::{
    EventBus, MemoryStore, SkillRegistry, SkillRegistryConfig, StandardMemoryStore,
    StandardSkillRegistry,
};
use praetor_cortex::{
    AgentSkill, CortexEvent, Experience, InMemoryExperienceRepository, InMemorySkillRepository,
    MemoryQuery, SkillStep, Verification,
};
use tokio::task::JoinSet;

struct NullEventBus;

#[async_trait]
impl EventBus for NullEventBus {
    async fn publish(&self, _event: CortexEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

fn skill_registry() -> Arc<StandardSkillRegistry> {
    Arc::new(StandardSkillRegistry::new(
        Arc::new(InMemorySkillRepository::new()),
        Arc::new(NullEventBus),
        SkillRegistryConfig::default(),
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_successful_executions_are_all_counted() {
    const WRITERS: u64 = 48;

    let registry = skill_registry();
    let id = registry
        .register_skill(AgentSkill::new("compile", "build", vec![SkillStep::new("cargo.build")]))
        .await
        .unwrap();

    let mut tasks = JoinSet::new();
    for i in 0..WRITERS {
        let registry = registry.clone();
        tasks.spawn(async move { registry.record_execution(id, true, 100 + i).await });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    let skill = registry.get_skill(id).await.unwrap();
    assert_eq!(skill.usage_count(), WRITERS);
    assert!((skill.success_rate() - 1.0).abs() < 1e-12);

    let expected_avg = (0..WRITERS).map(|i| (100 + i) as f64).sum::<f64>() / WRITERS as f64;
    assert!((skill.average_execution_ms() - expected_avg).abs() < 1e-6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_mixed_outcomes_keep_weighted_identity() {
    let registry = skill_registry();
    let id = registry
        .register_skill(AgentSkill::new("migrate", "db", vec![SkillStep::new("sql.migrate")]))
        .await
        .unwrap();

    let mut tasks = JoinSet::new();
    for i in 0..40u64 {
        let registry = registry.clone();
        tasks.spawn(async move { registry.record_execution(id, i % 4 != 0, 10).await });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    let skill = registry.get_skill(id).await.unwrap();
    assert_eq!(skill.usage_count(), 40);
    assert!((skill.success_rate() - 0.75).abs() < 1e-9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_writers_never_lose_experiences() {
    let store = Arc::new(StandardMemoryStore::new(
        Arc::new(InMemoryExperienceRepository::new()),
        Arc::new(NullEventBus),
    ));

    let mut tasks = JoinSet::new();
    for i in 0..200 {
        let store = store.clone();
        tasks.spawn(async move {
            store
                .store_experience(Experience::new(
                    format!("task-{i}"),
                    "agent-a",
                    i % 2 == 0,
                    Verification::new(0.5),
                ))
                .await
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    let stats = store.get_statistics().await.unwrap();
    assert_eq!(stats.total_experiences, 200);
    assert_eq!(stats.failed_experiences, 100);

    let all = store.query_experiences(&MemoryQuery::new(1_000)).await.unwrap();
    assert_eq!(all.len(), 200);
    assert!(all.windows(2).all(|w| w[0].timestamp() >= w[1].timestamp()));
}
