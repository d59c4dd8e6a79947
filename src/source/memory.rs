//! In-memory event sources
//!
//! - [`MemorySearch`]: an append-only log with offset cursors and a
//!   retention floor, behaving like a real paginated audit log.
//! - [`PagedSearch`]: fixed pages keyed by cursor, for exact page-boundary
//!   scenarios.
//!
//! Both record every query and can be told to fail the next call.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{SearchEvents, SearchQuery};
use crate::error::{FerryError, Result};
use crate::event::{AuditEvent, Batch, Cursor};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct LogState {
    events: Vec<AuditEvent>,
    expired: usize,
    failures: VecDeque<FerryError>,
    queries: Vec<SearchQuery>,
}

/// Append-only in-memory audit log.
///
/// Cursors are decimal offsets into the log. A full page carries the offset
/// after its last event as `next_cursor`; a short page carries an empty one,
/// so newly appended events show up on the same page when it is polled again.
#[derive(Default)]
pub struct MemorySearch {
    state: Mutex<LogState>,
}

impl MemorySearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event to the log
    pub fn push(&self, event: AuditEvent) {
        lock(&self.state).events.push(event);
    }

    pub fn extend(&self, events: impl IntoIterator<Item = AuditEvent>) {
        lock(&self.state).events.extend(events);
    }

    /// Drop the first `n` events from view, as retention expiry would
    pub fn expire_before(&self, n: usize) {
        let mut state = lock(&self.state);
        state.expired = n.min(state.events.len());
    }

    /// Make the next search call fail with `err`
    pub fn fail_next(&self, err: FerryError) {
        lock(&self.state).failures.push_back(err);
    }

    /// Every query received so far
    pub fn queries(&self) -> Vec<SearchQuery> {
        lock(&self.state).queries.clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SearchEvents for MemorySearch {
    async fn search(&self, query: &SearchQuery) -> Result<Batch> {
        let mut state = lock(&self.state);
        state.queries.push(query.clone());
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }

        let offset = if query.cursor.is_empty() {
            0
        } else {
            query.cursor.as_str().parse::<usize>().map_err(|_| {
                FerryError::source_permanent(format!("malformed cursor {:?}", query.cursor.as_str()))
            })?
        };

        let mut page = Vec::new();
        let mut last_index = None;
        for (index, event) in state.events.iter().enumerate().skip(offset.max(state.expired)) {
            if page.len() == query.limit {
                break;
            }
            let in_window = event.time() >= query.from && event.time() < query.to;
            let type_match =
                query.types.is_empty() || query.types.iter().any(|t| t == event.event_type());
            if in_window && type_match {
                page.push(event.clone());
                last_index = Some(index);
            }
        }

        let next_cursor = match last_index {
            Some(index) if page.len() == query.limit => Cursor::new((index + 1).to_string()),
            _ => Cursor::default(),
        };

        Ok(Batch::new(page, next_cursor))
    }
}

#[derive(Default)]
struct PageState {
    pages: HashMap<Cursor, Batch>,
    failures: VecDeque<FerryError>,
    queries: Vec<SearchQuery>,
}

/// Fixed pages keyed by cursor; unknown cursors return an empty page
#[derive(Default)]
pub struct PagedSearch {
    state: Mutex<PageState>,
}

impl PagedSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or replace) the page served for `cursor`
    pub fn set_page(&self, cursor: &str, events: Vec<AuditEvent>, next_cursor: &str) {
        lock(&self.state).pages.insert(
            Cursor::from(cursor),
            Batch::new(events, Cursor::from(next_cursor)),
        );
    }

    /// Make the next search call fail with `err`
    pub fn fail_next(&self, err: FerryError) {
        lock(&self.state).failures.push_back(err);
    }

    /// Every query received so far
    pub fn queries(&self) -> Vec<SearchQuery> {
        lock(&self.state).queries.clone()
    }
}

#[async_trait]
impl SearchEvents for PagedSearch {
    async fn search(&self, query: &SearchQuery) -> Result<Batch> {
        let mut state = lock(&self.state);
        state.queries.push(query.clone());
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }
        Ok(state.pages.get(&query.cursor).cloned().unwrap_or_default())
    }
}
