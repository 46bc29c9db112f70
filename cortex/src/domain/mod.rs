// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides mod functionality for the system.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements mod

pub mod error;
pub mod experience;
pub mod execution;
pub mod skill;
pub mod events;

pub use error::*;
pub use experience::*;
pub use execution::*;
pub use skill::*;
pub use events::*;
