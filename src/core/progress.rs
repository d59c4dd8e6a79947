/*!
 * Durable delivery progress: scan start time, page cursor and last delivered id
 */

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use ferry_core_checkpoint::CheckpointStore;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::event::{Cursor, EventId};

/// Sibling key suffixes under the source key
const CURSOR_SUFFIX: &str = "cursor";
const LAST_ID_SUFFIX: &str = "last_id";
const START_TIME_SUFFIX: &str = "start_time";

/// Checkpointed progress for one source.
///
/// The store is written synchronously on every mutation. Within
/// [`advance`](Progress::advance) the last delivered id is written before the
/// cursor; the store has no multi-key transaction, so a crash between the two
/// writes can pair the new id with the previous cursor. On restart that id is
/// not found on the previous page and its events are delivered again.
#[derive(Debug)]
pub struct Progress<S> {
    store: S,
    source_key: String,
    start_time: DateTime<Utc>,
    cursor: Cursor,
    last_delivered_id: EventId,
}

/// Point-in-time copy of the stored checkpoint, for reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub source_key: String,
    pub start_time: DateTime<Utc>,
    pub cursor: Cursor,
    pub last_delivered_id: EventId,
}

/// Checkpoint values as stored, read without validating or resetting them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredCheckpoint {
    pub start_time: Option<String>,
    pub cursor: Option<String>,
    pub last_delivered_id: Option<String>,
}

impl StoredCheckpoint {
    /// Nothing has ever been recorded for this source
    pub fn is_empty(&self) -> bool {
        self.start_time.is_none() && self.cursor.is_none() && self.last_delivered_id.is_none()
    }
}

/// Read the checkpoint for `source_key` without writing anything
pub fn inspect<S: CheckpointStore>(store: &S, source_key: &str) -> Result<StoredCheckpoint> {
    let key = |suffix: &str| format!("{}.{}", source_key, suffix);
    Ok(StoredCheckpoint {
        start_time: store.get(&key(START_TIME_SUFFIX))?,
        cursor: store.get(&key(CURSOR_SUFFIX))?,
        last_delivered_id: store.get(&key(LAST_ID_SUFFIX))?,
    })
}

impl<S: CheckpointStore> Progress<S> {
    /// Load progress for `source_key`, resetting it when the configured scan
    /// start differs from the one recorded by the previous run.
    pub fn load(store: S, source_key: &str, configured_start_time: DateTime<Utc>) -> Result<Self> {
        let mut progress = Self {
            store,
            source_key: source_key.to_string(),
            start_time: configured_start_time,
            cursor: Cursor::default(),
            last_delivered_id: EventId::default(),
        };

        let stored = progress.store.get(&progress.key(START_TIME_SUFFIX))?;
        let stored_start = stored.as_deref().map(DateTime::<FixedOffset>::parse_from_rfc3339);

        match stored_start {
            Some(Ok(t)) if t.with_timezone(&Utc) == configured_start_time => {
                progress.cursor = Cursor::new(
                    progress
                        .store
                        .get(&progress.key(CURSOR_SUFFIX))?
                        .unwrap_or_default(),
                );
                progress.last_delivered_id = EventId::new(
                    progress
                        .store
                        .get(&progress.key(LAST_ID_SUFFIX))?
                        .unwrap_or_default(),
                );
                info!(
                    source_key,
                    cursor = %progress.cursor,
                    last_id = %progress.last_delivered_id,
                    "Resuming from checkpoint"
                );
            }
            Some(Ok(t)) => {
                warn!(
                    source_key,
                    previous = %t.to_rfc3339(),
                    configured = %format_time(configured_start_time),
                    "Scan start time changed, discarding previous progress"
                );
                progress.reset_with_start_time()?;
            }
            Some(Err(e)) => {
                warn!(
                    source_key,
                    value = stored.as_deref().unwrap_or_default(),
                    error = %e,
                    "Stored scan start time is unreadable, discarding previous progress"
                );
                progress.reset_with_start_time()?;
            }
            None => {
                info!(
                    source_key,
                    start_time = %format_time(configured_start_time),
                    "No checkpoint found, starting a new scan"
                );
                progress.reset_with_start_time()?;
            }
        }

        Ok(progress)
    }

    /// Record a confirmed delivery: `delivered_id` was accepted by the sink and
    /// came from the page fetched with `cursor`.
    pub fn advance(&mut self, cursor: &Cursor, delivered_id: &EventId) -> Result<()> {
        let last_id_key = self.key(LAST_ID_SUFFIX);
        self.store.set(&last_id_key, delivered_id.as_str())?;

        // In-memory state changes only once both writes landed
        if *cursor != self.cursor {
            let cursor_key = self.key(CURSOR_SUFFIX);
            self.store.set(&cursor_key, cursor.as_str())?;
            debug!(cursor = %cursor, "Checkpoint cursor advanced");
            self.cursor = cursor.clone();
        }
        self.last_delivered_id = delivered_id.clone();

        Ok(())
    }

    /// Forget the cursor and last delivered id, keeping the scan start time
    pub fn reset(&mut self) -> Result<()> {
        self.write_empty_position()?;
        info!(source_key = %self.source_key, "Checkpoint reset");
        Ok(())
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn last_delivered_id(&self) -> &EventId {
        &self.last_delivered_id
    }

    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            source_key: self.source_key.clone(),
            start_time: self.start_time,
            cursor: self.cursor.clone(),
            last_delivered_id: self.last_delivered_id.clone(),
        }
    }

    /// Give the store back (used by tests that simulate a restart)
    pub fn into_store(self) -> S {
        self.store
    }

    /// Clear position, then record the new start time. A crash in between
    /// leaves the old start time, which resets again on the next run.
    fn reset_with_start_time(&mut self) -> Result<()> {
        self.write_empty_position()?;
        let key = self.key(START_TIME_SUFFIX);
        self.store.set(&key, &format_time(self.start_time))?;
        Ok(())
    }

    fn write_empty_position(&mut self) -> Result<()> {
        let last_id_key = self.key(LAST_ID_SUFFIX);
        let cursor_key = self.key(CURSOR_SUFFIX);
        self.store.set(&last_id_key, "")?;
        self.store.set(&cursor_key, "")?;
        self.last_delivered_id = EventId::default();
        self.cursor = Cursor::default();
        Ok(())
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}.{}", self.source_key, suffix)
    }
}

fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
