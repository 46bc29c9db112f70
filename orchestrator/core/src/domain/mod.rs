// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Governance domain model.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Actions, verdicts, permissions and the per-action lifecycle

pub mod action;
pub mod config;
pub mod error;
pub mod ethics;
pub mod events;
pub mod executor;
pub mod lifecycle;
pub mod parameter_inspector;
pub mod permission;
pub mod policy;
pub mod routing;
pub mod safety;

pub use action::*;
pub use error::GovernanceError;
pub use ethics::*;
pub use executor::*;
pub use lifecycle::*;
pub use permission::*;
pub use policy::*;
pub use routing::*;
pub use safety::*;
