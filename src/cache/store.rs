//! Durable tier storage for the tiered cache.
//!
//! A [`DurableStore`] only moves opaque serialized records around. Expiry and
//! decoding are the cache's job; the store never inspects what it holds.
//!
//! [`FileStore`] uses blocking `std::fs` calls even though the cache is read
//! from async code. Each call touches a single small file, and one fetch makes
//! at most a read, a write and a delete.

use crate::error::Result;
use crate::utils::slugify;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

/// Key → serialized record storage that outlives the process.
pub trait DurableStore: Send + Sync {
    /// Read the record stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<String>>;
    /// Replace the record stored under `key`.
    fn store(&self, key: &str, record: &str) -> Result<()>;
    /// Delete the record stored under `key`. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
    /// Delete every record.
    fn clear(&self) -> Result<()>;
}

/// Suffix marking the files a [`FileStore`] owns.
const RECORD_SUFFIX: &str = ".cache.json";

/// One JSON file per key inside a directory.
///
/// Records are named `{slug}.cache.json`. [`DurableStore::clear`] only deletes
/// files with that suffix, so sharing the directory with other files is safe.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{RECORD_SUFFIX}", slugify(key)))
    }
}

impl DurableStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, key: &str, record: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // Write-then-rename so readers never observe a half-written record.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, record)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), bytes = record.len(), "Stored durable cache record");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> Result<()> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0usize;
        for entry in entries {
            let path = entry?.path();
            let owned = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(RECORD_SUFFIX));
            if owned {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        debug!(dir = %self.dir.display(), removed, "Cleared durable cache records");
        Ok(())
    }
}
