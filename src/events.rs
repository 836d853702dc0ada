// src/events.rs

//! Events attached to records
//!
//! Reconcilers report noteworthy outcomes ("new app", status transitions)
//! through an [`EventRecorder`]. The binary logs them; tests collect them.

use crate::model::ObjectKey;
use parking_lot::Mutex;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Normal => write!(f, "Normal"),
            EventType::Warning => write!(f, "Warning"),
        }
    }
}

/// Record an event is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTarget {
    pub kind: &'static str,
    pub key: ObjectKey,
}

impl EventTarget {
    pub fn new(kind: &'static str, key: ObjectKey) -> Self {
        Self { kind, key }
    }
}

impl fmt::Display for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub target: EventTarget,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
}

pub trait EventRecorder: Send + Sync {
    fn publish(&self, target: &EventTarget, event_type: EventType, reason: &str, message: &str);
}

/// Writes events to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRecorder;

impl EventRecorder for TracingRecorder {
    fn publish(&self, target: &EventTarget, event_type: EventType, reason: &str, message: &str) {
        match event_type {
            EventType::Normal => info!(target: "marketplace::events", object = %target, reason, "{}", message),
            EventType::Warning => warn!(target: "marketplace::events", object = %target, reason, "{}", message),
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    events: Mutex<Vec<Event>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Messages of events carrying `reason`, in publish order
    pub fn messages(&self, reason: &str) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.reason == reason)
            .map(|e| e.message.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventRecorder for MemoryRecorder {
    fn publish(&self, target: &EventTarget, event_type: EventType, reason: &str, message: &str) {
        self.events.lock().push(Event {
            target: target.clone(),
            event_type,
            reason: reason.to_string(),
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_recorder_collects() {
        let recorder = MemoryRecorder::new();
        let target = EventTarget::new("Source", ObjectKey::cluster("stable"));

        recorder.publish(&target, EventType::Normal, "AppUpdate", "new app: mysql");
        recorder.publish(&target, EventType::Warning, "SyncRepo", "boom");

        assert_eq!(recorder.messages("AppUpdate"), vec!["new app: mysql"]);
        let events = recorder.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_type, EventType::Warning);
        assert_eq!(events[1].target.to_string(), "Source/stable");

        recorder.clear();
        assert!(recorder.events().is_empty());
    }
}
