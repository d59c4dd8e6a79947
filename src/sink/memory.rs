//! In-memory sink for testing

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::EventSink;
use crate::error::{FerryError, Result};
use crate::event::{AuditEvent, EventId};

#[derive(Default)]
struct SinkState {
    sent: Vec<AuditEvent>,
    attempts: usize,
    failures: VecDeque<FerryError>,
    reject: HashSet<EventId>,
    fail_after: Option<usize>,
}

/// Keeps every accepted event, in order.
///
/// Failures can be scripted three ways: the next `n` calls, every attempt to
/// send a given id, or everything after `n` accepted events.
#[derive(Default)]
pub struct RecordingSink {
    state: Mutex<SinkState>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next call with `err`
    pub fn fail_next(&self, err: FerryError) {
        self.lock().failures.push_back(err);
    }

    /// Reject every attempt to send `id`
    pub fn reject(&self, id: &str) {
        self.lock().reject.insert(EventId::from(id));
    }

    /// Reject everything once `n` events have been accepted
    pub fn fail_after(&self, n: usize) {
        self.lock().fail_after = Some(n);
    }

    /// Accepted events, in delivery order
    pub fn sent(&self) -> Vec<AuditEvent> {
        self.lock().sent.clone()
    }

    pub fn sent_ids(&self) -> Vec<String> {
        self.lock().sent.iter().map(|e| e.id().to_string()).collect()
    }

    /// Calls to `send`, successful or not
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn send(&self, event: &AuditEvent) -> Result<()> {
        let mut state = self.lock();
        state.attempts += 1;

        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }
        if state.reject.contains(event.id()) {
            return Err(FerryError::sink(
                format!("rejected {}", event.id()),
                Some(503),
            ));
        }
        if matches!(state.fail_after, Some(n) if state.sent.len() >= n) {
            return Err(FerryError::sink("collector unavailable", None));
        }

        state.sent.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ev(id: &str) -> AuditEvent {
        AuditEvent::new(id, "user.login", Utc::now())
    }

    #[tokio::test]
    async fn test_records_in_order() {
        let sink = RecordingSink::new();
        sink.send(&ev("a")).await.unwrap();
        sink.send(&ev("b")).await.unwrap();
        assert_eq!(sink.sent_ids(), vec!["a", "b"]);
        assert_eq!(sink.attempts(), 2);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let sink = RecordingSink::new();
        sink.fail_next(FerryError::sink("down", None));
        sink.reject("bad");

        assert!(sink.send(&ev("a")).await.is_err());
        assert!(sink.send(&ev("a")).await.is_ok());
        assert!(sink.send(&ev("bad")).await.is_err());
        assert_eq!(sink.sent_ids(), vec!["a"]);
        assert_eq!(sink.attempts(), 3);
    }

    #[tokio::test]
    async fn test_fail_after() {
        let sink = RecordingSink::new();
        sink.fail_after(1);
        assert!(sink.send(&ev("a")).await.is_ok());
        assert!(sink.send(&ev("b")).await.is_err());
    }
}
