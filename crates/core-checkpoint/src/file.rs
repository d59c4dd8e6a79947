//! File-per-key checkpoint store

use crate::error::{Error, Result};
use crate::key::validate_key;
use crate::CheckpointStore;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Temp files start with '.', which no valid key does
const TEMP_PREFIX: &str = ".tmp-";

/// Flat directory store: one file per key, file contents are the raw value.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if dir.exists() && !dir.is_dir() {
            return Err(Error::InvalidDirectory { path: dir });
        }
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory backing this store
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }
}

impl CheckpointStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| Error::CorruptValue {
                    key: key.to_string(),
                }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path)
            .map_err(|e| Error::write_failed(key, e.error.to_string()))?;

        // Make the rename itself durable
        #[cfg(unix)]
        fs::File::open(&self.dir)?.sync_all()?;

        trace!(key, bytes = value.len(), "checkpoint written");
        Ok(())
    }
}
