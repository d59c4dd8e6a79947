/*!
 * Delivery loop: fetch one event, send it, record progress, repeat
 *
 * Strictly sequential. An event's checkpoint is written only after the sink
 * accepted it, and the next fetch happens only after that write. A shutdown
 * request interrupts whatever is in flight; an interrupted send is never
 * checkpointed, so that event is sent again on the next run.
 */

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use ferry_core_checkpoint::CheckpointStore;
use tracing::{debug, error, info};

use super::progress::Progress;
use super::retry::RetryPolicy;
use crate::config::FerryConfig;
use crate::error::Result;
use crate::event::{AuditEvent, SourcedEvent};
use crate::sink::EventSink;
use crate::source::{EventSource, ScanParams, SearchEvents};
use crate::stats::DeliveryStats;

/// Why [`DeliveryLoop::run`] returned without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Shutdown was requested
    Stopped,
    /// The configured number of events was delivered
    Completed,
}

/// Loop settings taken from the configuration
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    pub poll_timeout: Duration,
    pub max_events: Option<u64>,
    pub retry: RetryPolicy,
}

impl DeliverySettings {
    pub fn from_config(config: &FerryConfig) -> Self {
        Self {
            poll_timeout: config.poll_timeout(),
            max_events: config.max_events,
            retry: RetryPolicy::from_config(config),
        }
    }
}

pub struct DeliveryLoop<S, K, C> {
    source: EventSource<S>,
    sink: K,
    progress: Progress<C>,
    settings: DeliverySettings,
    stats: DeliveryStats,
}

impl<S, K, C> DeliveryLoop<S, K, C>
where
    S: SearchEvents,
    K: EventSink,
    C: CheckpointStore,
{
    pub fn new(
        source: EventSource<S>,
        sink: K,
        progress: Progress<C>,
        settings: DeliverySettings,
    ) -> Self {
        Self {
            source,
            sink,
            progress,
            settings,
            stats: DeliveryStats::new(),
        }
    }

    /// Wire a loop from loaded progress: the source resumes at the stored
    /// cursor and skips past the stored last id.
    pub fn from_config(client: S, sink: K, progress: Progress<C>, config: &FerryConfig) -> Self {
        let params = ScanParams {
            start_time: progress.start_time(),
            end_time: config.end_time,
            namespace: config.namespace.clone(),
            types: config.types.clone(),
            batch_size: config.batch_size,
        };
        let source = EventSource::new(
            client,
            params,
            progress.cursor().clone(),
            progress.last_delivered_id().clone(),
        );
        Self::new(source, sink, progress, DeliverySettings::from_config(config))
    }

    /// Run until `shutdown` resolves, `max_events` deliveries are made, or a
    /// fatal error occurs. Statistics are logged in every case.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<DeliveryOutcome>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let result = self.deliver(shutdown.as_mut()).await;

        self.stats.page_flips = self.source.page_flips();
        self.stats.fetches = self.source.fetches();
        match &result {
            Ok(DeliveryOutcome::Stopped) => self.stats.log_summary("shutdown"),
            Ok(DeliveryOutcome::Completed) => self.stats.log_summary("max_events reached"),
            Err(e) => {
                error!(
                    category = %e.category(),
                    cursor = %self.progress.cursor(),
                    last_id = %self.progress.last_delivered_id(),
                    "Delivery stopped: {}",
                    e
                );
                self.stats.log_summary("fatal error");
            }
        }
        result
    }

    async fn deliver<F>(&mut self, mut shutdown: Pin<&mut F>) -> Result<DeliveryOutcome>
    where
        F: Future<Output = ()>,
    {
        info!(
            cursor = %self.progress.cursor(),
            last_id = %self.progress.last_delivered_id(),
            "Delivery started"
        );

        loop {
            if matches!(self.settings.max_events, Some(max) if self.stats.delivered >= max) {
                return Ok(DeliveryOutcome::Completed);
            }

            let next = tokio::select! {
                biased;
                _ = &mut shutdown => return Ok(DeliveryOutcome::Stopped),
                next = self.fetch_next() => next?,
            };

            let Some(sourced) = next else {
                self.stats.empty_polls += 1;
                debug!(
                    cursor = %self.source.cursor(),
                    wait_secs = self.settings.poll_timeout.as_secs(),
                    "No new events"
                );
                tokio::select! {
                    biased;
                    _ = &mut shutdown => return Ok(DeliveryOutcome::Stopped),
                    _ = tokio::time::sleep(self.settings.poll_timeout) => {}
                }
                continue;
            };

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(
                        event_id = %sourced.event.id(),
                        "Shutdown during send, event will be sent again on restart"
                    );
                    return Ok(DeliveryOutcome::Stopped);
                }
                sent = self.send(&sourced.event) => sent?,
            }

            self.record(&sourced)?;
        }
    }

    async fn fetch_next(&mut self) -> Result<Option<SourcedEvent>> {
        let mut retry = self.settings.retry.begin("fetch");
        loop {
            match self.source.next().await {
                Ok(next) => return Ok(next),
                Err(e) => {
                    retry.backoff(e).await?;
                    self.stats.retries += 1;
                }
            }
        }
    }

    async fn send(&mut self, event: &AuditEvent) -> Result<()> {
        let mut retry = self.settings.retry.begin("send");
        loop {
            match self.sink.send(event).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    retry.backoff(e).await?;
                    self.stats.retries += 1;
                }
            }
        }
    }

    fn record(&mut self, sourced: &SourcedEvent) -> Result<()> {
        self.progress.advance(&sourced.cursor, sourced.event.id())?;
        self.stats.delivered += 1;
        debug!(
            event_id = %sourced.event.id(),
            event_type = sourced.event.event_type(),
            cursor = %sourced.cursor,
            "Event delivered"
        );
        Ok(())
    }

    pub fn stats(&self) -> &DeliveryStats {
        &self.stats
    }

    pub fn progress(&self) -> &Progress<C> {
        &self.progress
    }

    /// Tear down the loop, e.g. to simulate a restart over the same store
    pub fn into_progress(self) -> Progress<C> {
        self.progress
    }
}
