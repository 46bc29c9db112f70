// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use thiserror::Error;

/// Errors raised by the memory store and the skill registry.
///
/// `NotFound` is recoverable by the caller. `InvalidOperation` and
/// `AlreadyExists` are rejected synchronously and never leave partial state.
/// `ConcurrencyConflict` is only surfaced after the component's own bounded
/// retries are exhausted.
#[derive(Debug, Error)]
pub enum CortexError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("Concurrent update conflict on {entity} {id} after {attempts} attempts")]
    ConcurrencyConflict {
        entity: &'static str,
        id: String,
        attempts: u32,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl CortexError {
    pub fn experience_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "experience",
            id: id.to_string(),
        }
    }

    pub fn skill_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "skill",
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors reported by repository backends.
///
/// `Conflict` signals a failed compare-and-swap; services translate it into a
/// retry rather than an error.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Entity already exists: {0}")]
    Duplicate(String),

    #[error("Version conflict: expected {expected}, found {found}")]
    Conflict { expected: u64, found: u64 },

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<RepositoryError> for CortexError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => CortexError::NotFound { entity: "entity", id },
            RepositoryError::Duplicate(id) => CortexError::AlreadyExists { entity: "entity", id },
            other => CortexError::Storage(other.to_string()),
        }
    }
}
