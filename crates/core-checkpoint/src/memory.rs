//! In-memory checkpoint store for testing
//!
//! Behaves like [`FileStore`](crate::FileStore) without touching the disk, and
//! can be told to start failing writes to exercise fatal checkpoint paths.

use crate::error::{Error, Result};
use crate::key::validate_key;
use crate::CheckpointStore;
use std::collections::HashMap;

/// In-memory checkpoint store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
    writes: usize,
    fail_after: Option<usize>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write once `n` writes have succeeded
    pub fn fail_writes_after(&mut self, n: usize) {
        self.fail_after = Some(n);
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Snapshot of all stored values
    pub fn values(&self) -> &HashMap<String, String> {
        &self.values
    }
}

impl CheckpointStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        if matches!(self.fail_after, Some(n) if self.writes >= n) {
            return Err(Error::write_failed(key, "scripted failure"));
        }
        self.values.insert(key.to_string(), value.to_string());
        self.writes += 1;
        Ok(())
    }
}
