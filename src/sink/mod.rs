//! Event sinks
//!
//! A sink accepts one event and reports whether the collector took it. It
//! keeps no state about delivery progress; that is the delivery loop's job.
//!
//! - [`HttpsSink`]: JSON POST to the collector over mutual TLS
//! - [`DryRunSink`]: logs events instead of sending them
//! - [`RecordingSink`]: keeps sent events in memory, with scripted failures

mod dry_run;
mod https;
mod memory;

pub use dry_run::DryRunSink;
pub use https::HttpsSink;
pub use memory::RecordingSink;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::event::AuditEvent;

/// Destination for audit events.
///
/// `Ok` means the collector confirmed receipt; only then may progress move.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, event: &AuditEvent) -> Result<()>;
}

#[async_trait]
impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    async fn send(&self, event: &AuditEvent) -> Result<()> {
        (**self).send(event).await
    }
}

#[async_trait]
impl<T: EventSink + ?Sized> EventSink for Box<T> {
    async fn send(&self, event: &AuditEvent) -> Result<()> {
        (**self).send(event).await
    }
}
