// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Audit sink that writes ethical concerns to the structured log and, when
//! wired, to the event bus. Both targets are non-blocking.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::domain::action::ActionContext;
use crate::domain::ethics::{AuditSink, EthicalConcern};
use crate::domain::events::GovernanceEvent;
use crate::infrastructure::event_bus::EventBus;

#[derive(Default)]
pub struct TracingAuditSink {
    event_bus: Option<Arc<EventBus>>,
}

impl TracingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_bus(event_bus: Arc<EventBus>) -> Self {
        Self {
            event_bus: Some(event_bus),
        }
    }
}

impl AuditSink for TracingAuditSink {
    fn record_concern(&self, concern: &EthicalConcern, context: &ActionContext) {
        warn!(
            concern_id = %concern.id,
            severity = ?concern.severity,
            action = concern.action.as_deref().unwrap_or("-"),
            agent_id = %context.agent_id,
            session_id = %context.session_id,
            description = %concern.description,
            "Ethical concern reported"
        );

        if let Some(event_bus) = &self.event_bus {
            event_bus.publish_governance_event(GovernanceEvent::EthicalConcernReported {
                concern_id: concern.id,
                description: concern.description.clone(),
                severity: concern.severity,
                agent_id: context.agent_id.clone(),
                reported_at: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ethics::ConcernSeverity;
    use crate::infrastructure::event_bus::DomainEvent;

    #[test]
    fn test_concern_is_published() {
        let event_bus = Arc::new(EventBus::new(8));
        let mut receiver = event_bus.subscribe();
        let sink = TracingAuditSink::with_event_bus(event_bus);

        let concern = EthicalConcern::new("agent tried to read HR records", ConcernSeverity::High)
            .for_action("read_file");
        sink.record_concern(&concern, &ActionContext::new("agent-3", "s-9"));

        match receiver.try_recv().unwrap() {
            DomainEvent::Governance(GovernanceEvent::EthicalConcernReported { concern_id, agent_id, .. }) => {
                assert_eq!(concern_id, concern.id);
                assert_eq!(agent_id, "agent-3");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_sink_without_bus_does_not_fail() {
        let sink = TracingAuditSink::new();
        sink.record_concern(
            &EthicalConcern::new("minor", ConcernSeverity::Low),
            &ActionContext::default(),
        );
    }
}
