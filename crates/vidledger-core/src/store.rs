//! Persisted master list
//!
//! The whole collection is one JSON document. Writes go to a temp file in the
//! same directory and are renamed over the target, so readers only ever see
//! the old or the new document.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{LedgerError, Result};
use crate::model::MasterCollection;

#[derive(Debug, Clone)]
pub struct MasterListStore {
    path: PathBuf,
}

impl MasterListStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<MasterCollection> {
        if !self.path.exists() {
            return Err(LedgerError::StoreMissing {
                path: self.path.clone(),
            });
        }
        load_document(&self.path)
    }

    /// Load, or start an empty collection on first run
    pub fn load_or_empty(&self, source_url: &str) -> Result<MasterCollection> {
        match self.load() {
            Err(LedgerError::StoreMissing { .. }) => {
                debug!(path = %self.path.display(), "no master list yet, starting empty");
                Ok(MasterCollection::new(source_url))
            }
            other => other,
        }
    }

    /// Stamp and atomically replace the persisted document
    pub fn write(&self, collection: &mut MasterCollection, now: DateTime<Utc>) -> Result<()> {
        collection.touch(now);
        let write_error = |source: std::io::Error| LedgerError::StoreWrite {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_string_pretty(collection)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(write_error)?;

        // Dropping `tmp` on any early return removes the partial file
        let mut tmp = NamedTempFile::new_in(&dir).map_err(write_error)?;
        tmp.write_all(json.as_bytes()).map_err(write_error)?;
        tmp.write_all(b"\n").map_err(write_error)?;
        tmp.as_file().sync_all().map_err(write_error)?;
        tmp.persist(&self.path).map_err(|e| write_error(e.error))?;

        info!(path = %self.path.display(), items = collection.len(), "master list written");
        Ok(())
    }
}

/// Parse and check a master list document (also used for backups)
pub(crate) fn load_document(path: &Path) -> Result<MasterCollection> {
    let corrupt = |message: String| LedgerError::StoreCorrupt {
        path: path.to_path_buf(),
        message,
    };
    let bytes = fs::read(path)?;
    let collection: MasterCollection =
        serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
    collection.check_invariants().map_err(corrupt)?;
    Ok(collection)
}
