/*!
 * Audit event model: events, ids, cursors and pages
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Stable identifier of one audit event
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty means "nothing delivered yet"
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque, server-issued pagination token.
///
/// Never parsed; only stored, replayed verbatim and compared for equality.
/// The empty cursor addresses the first page of the scan window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<start>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for Cursor {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One audit event as returned by the source.
///
/// Only `id`, `type` and `time` are interpreted; every other field is kept
/// verbatim and forwarded to the collector unchanged. Two events are equal
/// when their ids are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    id: EventId,

    #[serde(rename = "type")]
    event_type: String,

    time: DateTime<Utc>,

    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl AuditEvent {
    pub fn new(id: impl Into<String>, event_type: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            id: EventId::new(id),
            event_type: event_type.into(),
            time,
            fields: Map::new(),
        }
    }

    /// Attach an extra payload field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl PartialEq for AuditEvent {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AuditEvent {}

/// One page of search results plus the cursor for the following page
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub events: Vec<AuditEvent>,
    pub next_cursor: Cursor,
}

impl Batch {
    pub fn new(events: Vec<AuditEvent>, next_cursor: Cursor) -> Self {
        Self {
            events,
            next_cursor,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Index just past `id` on this page, if the page contains it
    pub fn position_after(&self, id: &EventId) -> Option<usize> {
        if id.is_empty() {
            return None;
        }
        self.events
            .iter()
            .position(|e| e.id() == id)
            .map(|i| i + 1)
    }
}

/// An event together with the cursor of the page it came from.
///
/// The cursor is what gets committed after the sink accepts the event:
/// re-fetching it yields the page that contains the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcedEvent {
    pub event: AuditEvent,
    pub cursor: Cursor,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_event_equality_is_by_id() {
        let a = AuditEvent::new("e1", "user.login", ts()).with_field("user", "alice");
        let b = AuditEvent::new("e1", "session.start", ts()).with_field("user", "bob");
        let c = AuditEvent::new("e2", "user.login", ts());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_event_keeps_unknown_fields() {
        let json = r#"{
            "id": "e1",
            "type": "user.login",
            "time": "2024-03-01T12:00:00Z",
            "user": "alice",
            "success": true,
            "addr": {"remote": "10.0.0.1:5555"}
        }"#;
        let event: AuditEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.id().as_str(), "e1");
        assert_eq!(event.event_type(), "user.login");
        assert_eq!(event.time(), ts());
        assert_eq!(event.fields()["user"], "alice");
        assert_eq!(event.fields()["addr"]["remote"], "10.0.0.1:5555");

        let out = serde_json::to_value(&event).unwrap();
        assert_eq!(out["type"], "user.login");
        assert_eq!(out["success"], true);
        assert_eq!(out["id"], "e1");
    }

    #[test]
    fn test_event_without_id_is_rejected() {
        let json = r#"{"type": "user.login", "time": "2024-03-01T12:00:00Z"}"#;
        assert!(serde_json::from_str::<AuditEvent>(json).is_err());
    }

    #[test]
    fn test_position_after() {
        let batch = Batch::new(
            vec![
                AuditEvent::new("a", "t", ts()),
                AuditEvent::new("b", "t", ts()),
                AuditEvent::new("c", "t", ts()),
            ],
            Cursor::from("p2"),
        );
        assert_eq!(batch.position_after(&EventId::from("a")), Some(1));
        assert_eq!(batch.position_after(&EventId::from("c")), Some(3));
        assert_eq!(batch.position_after(&EventId::from("zz")), None);
        assert_eq!(batch.position_after(&EventId::default()), None);
    }

    #[test]
    fn test_cursor_display() {
        assert_eq!(Cursor::default().to_string(), "<start>");
        assert_eq!(Cursor::from("p2").to_string(), "p2");
    }
}
