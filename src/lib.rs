/*!
 * Ferry - audit log shipping agent
 *
 * Reads events from a paginated, time-bounded audit search API and forwards
 * them one by one to a log collector over mutual TLS:
 * - At-least-once delivery with a durable checkpoint per source
 * - Resume mid-page after a restart without re-sending delivered events
 * - Progress reset when the configured scan start time changes
 * - Bounded retry with exponential backoff for transient failures
 * - Dry-run mode that logs events instead of sending them
 *
 * Author: Shane Wall <shaneawall@gmail.com>
 */

pub mod config;
pub mod core;
pub mod error;
pub mod event;
pub mod logging;
pub mod sink;
pub mod source;
pub mod stats;
pub mod tls;

// Re-export commonly used types
pub use config::{FerryConfig, LogLevel, SinkConfig, SourceConfig};
pub use core::{DeliveryLoop, DeliveryOutcome, Progress, ProgressSnapshot, RetryPolicy};
pub use error::{FerryError, Result};
pub use event::{AuditEvent, Batch, Cursor, EventId, SourcedEvent};
pub use sink::{DryRunSink, EventSink, HttpsSink, RecordingSink};
pub use source::{EventSource, HttpSearchClient, MemorySearch, PagedSearch, SearchEvents};
pub use stats::DeliveryStats;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
