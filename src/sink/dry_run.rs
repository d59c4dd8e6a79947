//! Sink that only logs what it would send

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use super::EventSink;
use crate::error::Result;
use crate::event::AuditEvent;

#[derive(Debug, Default)]
pub struct DryRunSink {
    seen: AtomicU64,
}

impl DryRunSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events "sent" so far
    pub fn seen(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventSink for DryRunSink {
    async fn send(&self, event: &AuditEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        self.seen.fetch_add(1, Ordering::Relaxed);
        info!(
            event_id = %event.id(),
            event_type = event.event_type(),
            time = %event.time(),
            "Dry run: event not sent"
        );
        debug!(%payload, "Dry run payload");
        Ok(())
    }
}
