// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::action::{ActionContext, PlanStep};

/// Effectful executor seam. Receives the (possibly sandboxed) step that
/// passed governance; never sees a step that did not.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, step: &PlanStep, context: &ActionContext) -> Result<ExecutionReport>;
}

/// What the executor reports back about one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub success: bool,
    /// Executor's confidence in the result, in `[0, 1]`.
    pub confidence: f64,
    /// Verified quality of the result, in `[0, 1]`.
    pub quality_score: f64,
    pub elapsed_ms: u64,
    pub output: Option<String>,
    #[serde(default)]
    pub transient_failure: bool,
}

impl ExecutionReport {
    pub fn succeeded(confidence: f64, quality_score: f64) -> Self {
        Self {
            success: true,
            confidence,
            quality_score,
            elapsed_ms: 0,
            output: None,
            transient_failure: false,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            confidence: 0.0,
            quality_score: 0.0,
            elapsed_ms: 0,
            output: Some(reason.into()),
            transient_failure: false,
        }
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn transient(mut self) -> Self {
        self.transient_failure = true;
        self
    }
}
