// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod repository;
pub mod experience_store;
pub mod skill_store;

pub use repository::*;
pub use experience_store::InMemoryExperienceRepository;
pub use skill_store::InMemorySkillRepository;
