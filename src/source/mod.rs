//! Audit event sources
//!
//! The remote log is reached through the [`SearchEvents`] capability: one
//! paginated, time-bounded search call. [`EventSource`] sits on top of it and
//! turns pages into a stream of not-yet-delivered events.
//!
//! # Pagination
//!
//! ```text
//!              fetch(cursor)                    fetch(next_cursor)
//!  ┌───────┐  ─────────────▶  ┌────────┐  flip  ┌────────┐
//!  │ Empty │                  │ Loaded │ ─────▶ │ Loaded │ ...
//!  └───────┘  ◀── no events   └───┬────┘        └────────┘
//!                                 │ position == len
//!                                 ▼
//!                          ┌───────────────┐
//!                          │ PageExhausted │ ── re-fetch same cursor
//!                          └───────────────┘
//! ```
//!
//! - After every fetch the batch is scanned for the last delivered id. If it
//!   is found, everything up to and including it is skipped; if not (first
//!   fetch, or the event aged out of the source's retention), the page is
//!   read from the start.
//! - A page whose events were all delivered already is flipped: the cursor
//!   moves to the page's `next_cursor` and one more fetch is made in the same
//!   call. An empty `next_cursor` (or one equal to the current cursor) means
//!   the source has nothing past this page yet, so the same cursor is polled
//!   again later.
//! - A fetch returning no events yields `None`. The cursor is left alone;
//!   new events may still land on that page. A scan window that is empty
//!   (start time in the future, or an end time before it) yields `None`
//!   without calling the source.
//! - The cursor only moves in memory here. What is durable is decided by the
//!   delivery loop after the sink accepts an event.

mod http;
mod memory;

pub use http::HttpSearchClient;
pub use memory::{MemorySearch, PagedSearch};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{FerryError, Result};
use crate::event::{Batch, Cursor, EventId, SourcedEvent};

/// Parameters of one search call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub namespace: String,
    pub types: Vec<String>,
    pub limit: usize,
    pub cursor: Cursor,
}

/// Paginated search over the remote audit log.
///
/// Must return the same page for the same `(cursor, limit)` until new events
/// land on it.
#[async_trait]
pub trait SearchEvents: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Batch>;
}

#[async_trait]
impl<T: SearchEvents + ?Sized> SearchEvents for Arc<T> {
    async fn search(&self, query: &SearchQuery) -> Result<Batch> {
        (**self).search(query).await
    }
}

#[async_trait]
impl<T: SearchEvents + ?Sized> SearchEvents for Box<T> {
    async fn search(&self, query: &SearchQuery) -> Result<Batch> {
        (**self).search(query).await
    }
}

/// What the scan asks the source for on every fetch
#[derive(Debug, Clone)]
pub struct ScanParams {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub namespace: String,
    pub types: Vec<String>,
    pub batch_size: usize,
}

/// Upper bound of the scan: now, capped by the configured end time
pub fn scan_window(
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let to = match end {
        Some(end) if end < now => end,
        _ => now,
    };
    (start, to)
}

/// Where the source stands relative to its current page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Nothing fetched yet, or the last fetch returned no events
    Empty,
    /// Events remain on the current page
    Loaded,
    /// Every event on the current page has been handed out
    PageExhausted,
}

/// Result of one fetch, after skipping already-delivered events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fetched {
    Ready,
    NoEvents,
    AllDelivered,
}

/// Cursor-driven reader that yields each event once, resuming mid-page after
/// a restart.
pub struct EventSource<S> {
    client: S,
    params: ScanParams,
    cursor: Cursor,
    last_delivered_id: EventId,
    batch: Batch,
    position: usize,
    fetched: bool,
    fetches: u64,
    page_flips: u64,
}

impl<S: SearchEvents> EventSource<S> {
    /// Start reading at `cursor`, skipping up to `last_delivered_id` on the
    /// first page that contains it.
    pub fn new(client: S, params: ScanParams, cursor: Cursor, last_delivered_id: EventId) -> Self {
        Self {
            client,
            params,
            cursor,
            last_delivered_id,
            batch: Batch::default(),
            position: 0,
            fetched: false,
            fetches: 0,
            page_flips: 0,
        }
    }

    /// Next event not yet handed out, or `None` when nothing is available now.
    ///
    /// Fetch errors are returned as-is; retrying is up to the caller.
    pub async fn next(&mut self) -> Result<Option<SourcedEvent>> {
        if let Some(event) = self.take_loaded() {
            return Ok(Some(event));
        }

        match self.fetch_page().await? {
            Fetched::Ready => Ok(self.take_loaded()),
            Fetched::NoEvents => Ok(None),
            Fetched::AllDelivered => {
                if !self.flip_page() {
                    return Ok(None);
                }
                match self.fetch_page().await? {
                    Fetched::Ready => Ok(self.take_loaded()),
                    Fetched::NoEvents | Fetched::AllDelivered => Ok(None),
                }
            }
        }
    }

    pub fn state(&self) -> SourceState {
        if !self.fetched || self.batch.is_empty() {
            SourceState::Empty
        } else if self.position < self.batch.len() {
            SourceState::Loaded
        } else {
            SourceState::PageExhausted
        }
    }

    /// Cursor of the current page
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Id of the last event handed out (in memory only)
    pub fn last_delivered_id(&self) -> &EventId {
        &self.last_delivered_id
    }

    pub fn fetches(&self) -> u64 {
        self.fetches
    }

    pub fn page_flips(&self) -> u64 {
        self.page_flips
    }

    fn take_loaded(&mut self) -> Option<SourcedEvent> {
        let event = self.batch.events.get(self.position)?.clone();
        self.position += 1;
        self.last_delivered_id = event.id().clone();
        Some(SourcedEvent {
            event,
            cursor: self.cursor.clone(),
        })
    }

    async fn fetch_page(&mut self) -> Result<Fetched> {
        let (from, to) = scan_window(self.params.start_time, self.params.end_time, Utc::now());
        if from >= to {
            debug!(from = %from, to = %to, "Scan window is empty, not querying");
            return Ok(Fetched::NoEvents);
        }

        let query = SearchQuery {
            from,
            to,
            namespace: self.params.namespace.clone(),
            types: self.params.types.clone(),
            limit: self.params.batch_size,
            cursor: self.cursor.clone(),
        };

        let batch = self.client.search(&query).await?;
        self.fetches += 1;

        if let Some(bad) = batch.events.iter().position(|e| e.id().is_empty()) {
            return Err(FerryError::InvalidEvent(format!(
                "event {} on page {} has an empty id",
                bad, self.cursor
            )));
        }

        self.position = batch.position_after(&self.last_delivered_id).unwrap_or(0);
        self.batch = batch;
        self.fetched = true;

        debug!(
            cursor = %self.cursor,
            next_cursor = %self.batch.next_cursor,
            events = self.batch.len(),
            skip = self.position,
            "Fetched page"
        );

        Ok(if self.batch.is_empty() {
            Fetched::NoEvents
        } else if self.position >= self.batch.len() {
            Fetched::AllDelivered
        } else {
            Fetched::Ready
        })
    }

    /// Move to the next page; false when the source has no page after this one
    fn flip_page(&mut self) -> bool {
        let next = &self.batch.next_cursor;
        if next.is_empty() || *next == self.cursor {
            debug!(cursor = %self.cursor, "Page fully delivered, no next page yet");
            return false;
        }

        info!(from = %self.cursor, to = %next, "Page flip");
        self.cursor = next.clone();
        self.page_flips += 1;
        true
    }
}
