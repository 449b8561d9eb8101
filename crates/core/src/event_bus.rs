//! Unified event bus — trait for emitting analytics events from any module.
//!
//! Modules accept an `Arc<dyn EventSink>` to emit events into the
//! analytics rollup pipeline without depending on `wireline-analytics`
//! directly, breaking the cycle C1/C3/C4 would otherwise have on C5.

use crate::ids::OrgId;
use crate::model::{AnalyticsEvent, EventType};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Trait for emitting analytics events. Implementations route events to
/// ClickHouse (via mpsc), NATS (pub/sub), or customer webhooks.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AnalyticsEvent);
}

/// No-op sink for tests and modules that don't need event emission.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: AnalyticsEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn count_type(&self, event_type: EventType) -> usize {
        self.events.lock().iter().filter(|e| e.event_type == event_type).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: AnalyticsEvent) {
        self.events.lock().push(event);
    }
}

/// Convenience builder for creating an `AnalyticsEvent` with minimal
/// boilerplate; callers fill in whatever `attributes` their event type
/// needs.
pub fn make_event(org_id: OrgId, event_type: EventType) -> AnalyticsEvent {
    AnalyticsEvent {
        event_id: Uuid::new_v4(),
        org_id,
        event_type,
        channel_id: None,
        campaign_id: None,
        lead_id: None,
        revenue: None,
        timestamp: Utc::now(),
        attributes: Default::default(),
    }
}

pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_sink() {
        let sink = capture_sink();
        assert_eq!(sink.count(), 0);

        let org = OrgId::new();
        sink.emit(make_event(org, EventType::InboundReceived));
        sink.emit(make_event(org, EventType::OutboundSent));

        assert_eq!(sink.count(), 2);
        assert_eq!(sink.count_type(EventType::InboundReceived), 1);
        assert_eq!(sink.count_type(EventType::OutboundSent), 1);
    }

    #[test]
    fn test_noop_sink() {
        let sink = noop_sink();
        sink.emit(make_event(OrgId::new(), EventType::LeadCreated));
    }
}
