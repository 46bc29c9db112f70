// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Praetor core
//!
//! Governance control plane that sits between an agent's planner and its
//! executor.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Ethics, safety and uncertainty gating of proposed actions,
//!   with every outcome recorded to the cortex memory store

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
