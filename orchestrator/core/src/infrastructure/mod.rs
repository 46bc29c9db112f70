// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod audit;
pub mod event_bus;
pub mod human_approval;
pub mod permission_registry;
pub mod telemetry;

pub use audit::TracingAuditSink;
pub use event_bus::{DomainEvent, EventBus, EventBusError};
pub use human_approval::{HumanApprovalService, PendingApprovalInfo};
pub use permission_registry::InMemoryPermissionRepository;
pub use telemetry::init_tracing;
