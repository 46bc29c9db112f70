// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Memory Pruner - optional retention sweep for the experience log
//!
//! Periodically removes experiences older than the configured retention
//! window. Disabled by default: experiences are training signal and deleting
//! them is an explicit operator decision.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Background retention task with graceful shutdown

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::MemoryStore;
use crate::domain::CortexError;

/// Upper bound accepted for `retention_days` (roughly a century).
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Configuration for the memory pruner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryPrunerConfig {
    /// Experiences older than this many days are removed
    pub retention_days: i64,

    /// How often to run the pruner (in seconds)
    pub interval_seconds: u64,

    /// Whether pruning is enabled
    pub enabled: bool,
}

impl Default for MemoryPrunerConfig {
    fn default() -> Self {
        Self {
            retention_days: 365,
            interval_seconds: 3600,
            enabled: false,
        }
    }
}

pub struct MemoryPruner {
    memory: Arc<dyn MemoryStore>,
    config: MemoryPrunerConfig,
    shutdown_token: CancellationToken,
}

impl MemoryPruner {
    pub fn new(memory: Arc<dyn MemoryStore>, config: MemoryPrunerConfig) -> Self {
        Self {
            memory,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a handle to trigger shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Start the pruner background task
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        if !self.config.enabled {
            info!("Memory pruner is disabled");
            return;
        }

        info!(
            interval_seconds = self.config.interval_seconds,
            retention_days = self.config.retention_days,
            "Starting memory pruner background task"
        );

        let mut tick = interval(Duration::from_secs(self.config.interval_seconds.max(1)));

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    debug!("Running memory pruner cycle");
                    match self.prune_cycle().await {
                        Ok(pruned_count) => info!(pruned_count, "Memory pruner cycle completed"),
                        Err(e) => warn!(error = %e, "Memory pruner cycle failed"),
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping memory pruner");
                    break;
                }
            }
        }

        info!("Memory pruner background task stopped");
    }

    /// Execute a single pruning cycle
    pub async fn prune_cycle(&self) -> Result<usize, CortexError> {
        let retention_days = self.config.retention_days;
        let cutoff = TimeDelta::try_days(retention_days)
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
            .ok_or_else(|| {
                CortexError::InvalidOperation(format!(
                    "retention of {retention_days} days is out of range"
                ))
            })?;
        self.memory.prune_older_than(cutoff).await
    }
}
