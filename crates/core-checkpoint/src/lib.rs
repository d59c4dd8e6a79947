//! Ferry Core Checkpoint: durable progress storage
//!
//! # Overview
//!
//! This crate stores opaque progress tokens (strings) under string keys. It has
//! no knowledge of cursors, events or delivery; callers decide what the values
//! mean. Two implementations are provided:
//!
//! - [`FileStore`]: flat, single-directory store with one file per key. Each
//!   write lands in a temp file first and is renamed over the target, so a key
//!   is always either fully old or fully new.
//! - [`MemoryStore`]: in-memory map for tests, with scriptable write failures.
//!
//! # Layout
//!
//! ```text
//! <storage_dir>/
//! ├── src-3f2a…9c.cursor       raw cursor string
//! ├── src-3f2a…9c.last_id      raw event id
//! └── src-3f2a…9c.start_time   RFC 3339 timestamp
//! ```
//!
//! # Example
//!
//! ```no_run
//! use ferry_core_checkpoint::{source_key, CheckpointStore, FileStore};
//!
//! let mut store = FileStore::open("/var/lib/ferry").unwrap();
//! let key = source_key("https://auth.example.com:3025", "default");
//!
//! store.set(&format!("{key}.cursor"), "page-2").unwrap();
//! assert_eq!(
//!     store.get(&format!("{key}.cursor")).unwrap().as_deref(),
//!     Some("page-2")
//! );
//! ```

pub mod error;
pub mod file;
pub mod key;
pub mod memory;

pub use error::{Error, Result};
pub use file::FileStore;
pub use key::{source_key, validate_key};
pub use memory::MemoryStore;

/// Durable key/value storage for checkpoint values.
///
/// Access is single-threaded by contract (one process, one delivery loop), so
/// writes take `&mut self` and no locking is provided.
pub trait CheckpointStore {
    /// Read the value stored under `key`, or `None` if it was never written.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// Returning `Ok` means the value is durable.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

impl<S: CheckpointStore + ?Sized> CheckpointStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}
