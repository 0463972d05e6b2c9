//! Stored configuration: backup writing and the offline configuration source.
//!
//! [`BackupDirectory`] keeps one file per backup named
//! `{host}_{YYYYmmdd_HHMMSS}.txt`. The newest file for a host is the one with
//! the lexicographically greatest timestamp, which is what offline compliance
//! checks and rollbacks read.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::{debug, info};

use crate::error::StoreError;

/// Timestamp layout used in backup file names.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Source of previously stored configuration text.
pub trait ConfigSource: Send + Sync {
    /// Most recently stored configuration for `host`, or `None` if there is none.
    fn latest(&self, host: &str) -> Result<Option<String>, StoreError>;
}

/// Destination for retrieved configuration text.
pub trait BackupSink: Send + Sync {
    /// Store `config` for `host` and return where it was written.
    fn save(&self, host: &str, config: &str) -> Result<PathBuf, StoreError>;
}

/// Filesystem backup store.
#[derive(Debug, Clone)]
pub struct BackupDirectory {
    root: PathBuf,
}

impl BackupDirectory {
    /// Use `root` as the backup directory. It is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The backup directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a backup stamped with an explicit time.
    pub fn save_at(
        &self,
        host: &str,
        config: &str,
        at: DateTime<Local>,
    ) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.root).map_err(|source| self.io_error(&self.root, source))?;

        let path = self
            .root
            .join(format!("{}_{}.txt", host, at.format(TIMESTAMP_FORMAT)));
        fs::write(&path, config).map_err(|source| self.io_error(&path, source))?;

        info!("Backup saved: {}", path.display());
        Ok(path)
    }

    /// Backup files for `host`, oldest first.
    pub fn backups(&self, host: &str) -> Result<Vec<PathBuf>, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(self.io_error(&self.root, source)),
        };

        let mut names: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| self.io_error(&self.root, source))?;
            if let Some(name) = entry.file_name().to_str() {
                if is_backup_of(name, host) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        Ok(names.into_iter().map(|name| self.root.join(name)).collect())
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl BackupSink for BackupDirectory {
    fn save(&self, host: &str, config: &str) -> Result<PathBuf, StoreError> {
        self.save_at(host, config, Local::now())
    }
}

impl ConfigSource for BackupDirectory {
    fn latest(&self, host: &str) -> Result<Option<String>, StoreError> {
        let Some(path) = self.backups(host)?.pop() else {
            debug!("No backup found for {}", host);
            return Ok(None);
        };

        debug!("Using backup {} for {}", path.display(), host);
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|source| self.io_error(&path, source))
    }
}

/// Whether `name` is exactly `{host}_{YYYYmmdd_HHMMSS}.txt`.
///
/// Host `10.0.0.1` must not pick up backups of `10.0.0.10`.
fn is_backup_of(name: &str, host: &str) -> bool {
    let Some(stamp) = name
        .strip_prefix(host)
        .and_then(|rest| rest.strip_prefix('_'))
        .and_then(|rest| rest.strip_suffix(".txt"))
    else {
        return false;
    };

    let bytes = stamp.as_bytes();
    bytes.len() == 15
        && bytes[8] == b'_'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 8 || b.is_ascii_digit())
}
