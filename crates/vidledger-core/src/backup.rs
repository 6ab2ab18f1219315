//! Timestamped copies of the master list taken before each rewrite
//!
//! Backups sit next to the master file as `<file>.backup_<YYYYMMDDHHMMSS>`
//! and share its schema. They are never overwritten and never pruned.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::{LedgerError, Result};
use crate::store::{load_document, MasterListStore};

const BACKUP_MARKER: &str = ".backup_";
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// One backup file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSnapshot {
    pub name: String,
    pub path: PathBuf,
    pub taken_at: NaiveDateTime,
}

impl BackupSnapshot {
    pub fn display_time(&self) -> String {
        self.taken_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Result of [`BackupManager::restore`]
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub restored: BackupSnapshot,
    /// Copy of the state that was replaced, if there was one
    pub previous: Option<BackupSnapshot>,
    pub items: usize,
}

#[derive(Debug, Clone)]
pub struct BackupManager {
    master_file: PathBuf,
}

impl BackupManager {
    pub fn new(store: &MasterListStore) -> Self {
        Self {
            master_file: store.path().to_path_buf(),
        }
    }

    fn dir(&self) -> PathBuf {
        match self.master_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn base_name(&self) -> String {
        self.master_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Copy the persisted master list, if there is one
    pub fn snapshot(&self, now: DateTime<Utc>) -> Result<Option<BackupSnapshot>> {
        if !self.master_file.is_file() {
            return Ok(None);
        }

        // A source that does not load is not worth keeping, and should not be rewritten either
        load_document(&self.master_file)?;
        let bytes = fs::read(&self.master_file)?;

        let taken_at = now.naive_utc();
        let taken_at = taken_at.with_nanosecond(0).unwrap_or(taken_at);
        let name = format!(
            "{}{}{}",
            self.base_name(),
            BACKUP_MARKER,
            taken_at.format(TIMESTAMP_FORMAT)
        );
        let path = self.dir().join(&name);

        write_backup(&self.dir(), &path, &bytes)?;

        info!(backup = %path.display(), "snapshot taken");
        Ok(Some(BackupSnapshot {
            name,
            path,
            taken_at,
        }))
    }

    /// Backups of this master file, newest first
    pub fn list(&self) -> Result<Vec<BackupSnapshot>> {
        let dir = self.dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let prefix = format!("{}{}", self.base_name(), BACKUP_MARKER);
        let mut backups = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(taken_at) = name.strip_prefix(&prefix).and_then(parse_timestamp) else {
                continue;
            };
            backups.push(BackupSnapshot {
                path: entry.path(),
                name,
                taken_at,
            });
        }
        backups.sort_by(|a, b| b.taken_at.cmp(&a.taken_at));
        Ok(backups)
    }

    pub fn get(&self, name: &str) -> Result<BackupSnapshot> {
        self.list()?
            .into_iter()
            .find(|b| b.name == name)
            .ok_or_else(|| LedgerError::BackupNotFound {
                name: name.to_string(),
            })
    }

    /// Put a backup back in place of the master list
    pub fn restore(&self, store: &MasterListStore, name: &str, now: DateTime<Utc>) -> Result<RestoreOutcome> {
        let restored = self.get(name)?;
        let mut collection = load_document(&restored.path)?;
        let previous = self.snapshot(now)?;
        store.write(&mut collection, now)?;
        info!(backup = %restored.name, items = collection.len(), "backup restored");
        Ok(RestoreOutcome {
            restored,
            previous,
            items: collection.len(),
        })
    }
}

/// Fill a temp file next to `path`, then link it into place without replacing anything
fn write_backup(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let write_error = |source: std::io::Error| LedgerError::BackupWrite {
        path: path.to_path_buf(),
        source,
    };
    if path.exists() {
        return Err(LedgerError::BackupCollision {
            path: path.to_path_buf(),
        });
    }

    // Dropping `tmp` on any early return removes the partial file
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_error)?;
    tmp.write_all(bytes).map_err(write_error)?;
    tmp.as_file().sync_all().map_err(write_error)?;
    tmp.persist_noclobber(path).map_err(|e| match e.error.kind() {
        ErrorKind::AlreadyExists => LedgerError::BackupCollision {
            path: path.to_path_buf(),
        },
        _ => write_error(e.error),
    })?;
    Ok(())
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()
}
