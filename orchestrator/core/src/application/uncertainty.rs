// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Uncertainty Routing Service
//!
//! Classifies a task by confidence and attempt count into a
//! [`FallbackStrategy`]. The router only recommends; it never executes.
//!
//! | condition                              | strategy                         |
//! |----------------------------------------|----------------------------------|
//! | attempts ≥ max                         | `EscalateToHuman`                |
//! | confidence ≥ acceptance                | `UseDefault` (`Retry` if transient) |
//! | decompose ≤ confidence < acceptance    | `GatherMoreContext` first, then `UseConservativeApproach` |
//! | clarification ≤ confidence < decompose | `DecomposeTask`, `Defer` on the last attempt |
//! | confidence < clarification, or NaN     | `RequestClarification`           |

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::domain::action::ActionContext;
use crate::domain::config::UncertaintyConfig;
use crate::domain::routing::{FallbackStrategy, RoutingDecision, RoutingTask};

const HIGH_RISK: f64 = 0.8;
const MEDIUM_RISK: f64 = 0.5;
const BASELINE_RISK: f64 = 0.2;

static HIGH_RISK_TERMS: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)\b(delete|drop|deploy|production|payment|transfer|credentials?|shutdown|wipe|irreversible)").ok()
});

static MEDIUM_RISK_TERMS: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)\b(write|update|modify|install|send|post|execute|publish)").ok()
});

#[async_trait]
pub trait UncertaintyRouter: Send + Sync {
    async fn route(&self, task: &RoutingTask, context: &ActionContext, confidence: f64) -> RoutingDecision;

    async fn determine_fallback(&self, task: &RoutingTask, confidence: f64, attempt_count: u32) -> FallbackStrategy;

    async fn requires_human_oversight(&self, task: &RoutingTask, confidence: f64) -> bool;

    /// Risk in `[0, 1]`.
    async fn assess_risk(&self, task: &RoutingTask) -> f64;
}

/// Threshold-table router. Stateless apart from its configuration.
#[derive(Debug, Clone, Default)]
pub struct StandardUncertaintyRouter {
    config: UncertaintyConfig,
}

impl StandardUncertaintyRouter {
    pub fn new(config: UncertaintyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UncertaintyConfig {
        &self.config
    }

    fn fallback(&self, task: &RoutingTask, confidence: f64, attempt_count: u32) -> FallbackStrategy {
        let cfg = &self.config;
        if attempt_count >= cfg.max_attempts {
            return FallbackStrategy::EscalateToHuman;
        }
        if !confidence.is_finite() || confidence < cfg.clarification_threshold {
            return FallbackStrategy::RequestClarification;
        }
        if confidence >= cfg.acceptance_threshold {
            return if task.last_failure_transient {
                FallbackStrategy::Retry
            } else {
                FallbackStrategy::UseDefault
            };
        }
        if confidence >= cfg.decompose_threshold {
            return if attempt_count == 0 {
                FallbackStrategy::GatherMoreContext
            } else {
                FallbackStrategy::UseConservativeApproach
            };
        }
        if attempt_count + 1 >= cfg.max_attempts {
            FallbackStrategy::Defer
        } else {
            FallbackStrategy::DecomposeTask
        }
    }

    fn risk(&self, task: &RoutingTask) -> f64 {
        let matches = |terms: &Lazy<Option<Regex>>| {
            terms
                .as_ref()
                .map(|re| re.is_match(&task.description) || re.is_match(&task.id))
                .unwrap_or(true)
        };
        let heuristic = if matches(&HIGH_RISK_TERMS) {
            HIGH_RISK
        } else if matches(&MEDIUM_RISK_TERMS) {
            MEDIUM_RISK
        } else {
            BASELINE_RISK
        };

        match task.declared_risk {
            Some(declared) if declared.is_finite() => heuristic.max(declared.clamp(0.0, 1.0)),
            _ => heuristic,
        }
    }

    fn oversight(&self, task: &RoutingTask, confidence: f64) -> bool {
        task.attempt_count >= self.config.max_attempts
            || !confidence.is_finite()
            || confidence < self.config.clarification_threshold
            || self.risk(task) >= self.config.high_risk_threshold
    }

    fn reason(strategy: FallbackStrategy, confidence: f64, attempt_count: u32) -> String {
        match strategy {
            FallbackStrategy::EscalateToHuman => {
                format!("{attempt_count} attempts reached the escalation ceiling")
            }
            FallbackStrategy::UseDefault => format!("confidence {confidence:.2} meets the acceptance threshold"),
            FallbackStrategy::Retry => {
                format!("confidence {confidence:.2} is acceptable and the last failure was transient")
            }
            FallbackStrategy::GatherMoreContext => {
                format!("confidence {confidence:.2} is moderate; gather more context first")
            }
            FallbackStrategy::UseConservativeApproach => {
                format!("confidence {confidence:.2} is moderate after {attempt_count} attempts; proceed conservatively")
            }
            FallbackStrategy::DecomposeTask => format!("confidence {confidence:.2} is low; split the task"),
            FallbackStrategy::Defer => {
                format!("confidence {confidence:.2} is low on the last attempt before escalation; defer")
            }
            FallbackStrategy::RequestClarification => {
                format!("confidence {confidence:.2} is too low to act without clarification")
            }
        }
    }
}

#[async_trait]
impl UncertaintyRouter for StandardUncertaintyRouter {
    async fn route(&self, task: &RoutingTask, context: &ActionContext, confidence: f64) -> RoutingDecision {
        let strategy = self.fallback(task, confidence, task.attempt_count);
        let requires_human_oversight = self.oversight(task, confidence);
        let reported = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        debug!(
            task = %task.id,
            context = %context,
            confidence = reported,
            attempts = task.attempt_count,
            strategy = strategy.as_str(),
            requires_human_oversight = requires_human_oversight,
            "Task routed"
        );

        RoutingDecision {
            confidence: reported,
            should_proceed: strategy.is_proceed(),
            strategy,
            reason: Self::reason(strategy, reported, task.attempt_count),
            requires_human_oversight,
        }
    }

    async fn determine_fallback(&self, task: &RoutingTask, confidence: f64, attempt_count: u32) -> FallbackStrategy {
        self.fallback(task, confidence, attempt_count)
    }

    async fn requires_human_oversight(&self, task: &RoutingTask, confidence: f64) -> bool {
        self.oversight(task, confidence)
    }

    async fn assess_risk(&self, task: &RoutingTask) -> f64 {
        self.risk(task)
    }
}
