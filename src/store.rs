use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local};
use log::{debug, info};
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::clock::Clock;
use crate::error::BackupError;
use crate::tokens::TokenProvider;
use crate::utils::format_size;

/// Web-server directive denying direct access to the backup directory.
const PROTECT_MARKER: &str = ".htaccess";
const PROTECT_CONTENT: &str = "deny from all";

const BACKUP_SUFFIX: &str = ".sql";

/// Metadata for one completed dump file on disk.
#[derive(Debug, Clone, Serialize)]
pub struct BackupRecord {
    pub filename: String,
    pub size_bytes: u64,
    pub size: String,
    pub created_at: DateTime<Local>,
    pub download_token: String,
}

/// Owns the on-disk backup directory. All mutations go through staged temp
/// files and an atomic rename, so a concurrent `list` never observes a
/// partial backup.
pub struct BackupStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenProvider>,
}

impl BackupStore {
    pub fn new(
        root: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
        tokens: Arc<dyn TokenProvider>,
    ) -> BackupStore {
        BackupStore {
            root: root.into(),
            clock,
            tokens,
        }
    }

    /// Creates the directory and its protection marker if absent.
    pub fn init(&self) -> Result<(), BackupError> {
        fs::create_dir_all(&self.root).map_err(BackupError::StorageWriteFailed)?;
        let marker = self.root.join(PROTECT_MARKER);
        if !marker.exists() {
            debug!("Writing directory protection marker {}", marker.display());
            fs::write(&marker, PROTECT_CONTENT).map_err(BackupError::StorageWriteFailed)?;
        }
        Ok(())
    }

    /// Completed backups, newest first. Modification time and size are taken
    /// from the directory scan itself, one stat per file.
    pub fn list(&self) -> Result<Vec<BackupRecord>, BackupError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BackupError::StorageWriteFailed(e)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(BackupError::StorageWriteFailed)?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name == PROTECT_MARKER || !name.ends_with(BACKUP_SUFFIX) {
                continue;
            }
            let metadata = entry.metadata().map_err(BackupError::StorageWriteFailed)?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().map_err(BackupError::StorageWriteFailed)?;
            records.push(BackupRecord {
                filename: name.to_string(),
                size_bytes: metadata.len(),
                size: format_size(metadata.len()),
                created_at: DateTime::<Local>::from(modified),
                download_token: self.tokens.issue(name),
            });
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Writes `content` as a new backup for `db_name`.
    pub fn create(&self, content: &[u8], db_name: &str) -> Result<BackupRecord, BackupError> {
        let mut staged = self.stage()?;
        staged
            .write_all(content)
            .map_err(BackupError::StorageWriteFailed)?;
        self.commit(staged, db_name)
    }

    /// Reserves a staging file inside the store directory. Staged files carry
    /// no `.sql` suffix, so `list` never sees them.
    pub fn stage(&self) -> Result<NamedTempFile, BackupError> {
        self.init()?;
        NamedTempFile::new_in(&self.root).map_err(BackupError::StorageWriteFailed)
    }

    /// Promotes a staged file to a completed backup under its final name.
    /// A same-second name collision for the same database is refused rather
    /// than overwritten.
    pub fn commit(
        &self,
        staged: NamedTempFile,
        db_name: &str,
    ) -> Result<BackupRecord, BackupError> {
        staged
            .as_file()
            .sync_all()
            .map_err(BackupError::StorageWriteFailed)?;

        let timestamp = self.clock.now().format("%Y%m%d%H%M%S");
        let filename = format!("backup-{}-{}{}", db_name, timestamp, BACKUP_SUFFIX);
        let path = self.root.join(&filename);

        staged
            .persist_noclobber(&path)
            .map_err(|e| BackupError::StorageWriteFailed(e.error))?;
        info!("Backup written: {}", path.display());

        let metadata = fs::metadata(&path).map_err(BackupError::StorageWriteFailed)?;
        let modified = metadata.modified().map_err(BackupError::StorageWriteFailed)?;
        Ok(BackupRecord {
            size_bytes: metadata.len(),
            size: format_size(metadata.len()),
            created_at: DateTime::<Local>::from(modified),
            download_token: self.tokens.issue(&filename),
            filename,
        })
    }

    /// Removes one backup. The file is gone from the filesystem before this
    /// returns, so a following `list` cannot show it.
    pub fn delete(&self, filename: &str) -> Result<(), BackupError> {
        let path = self.resolve(filename)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted backup {}", filename);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BackupError::NotFound),
            Err(e) => Err(BackupError::StorageWriteFailed(e)),
        }
    }

    /// Resolves a backup name to its on-disk path for download delivery.
    pub fn get_path(&self, filename: &str) -> Result<PathBuf, BackupError> {
        Ok(self.download(filename)?.0)
    }

    /// Path and size for download delivery, from one metadata lookup.
    /// Only a genuinely missing file maps to `NotFound`.
    pub fn download(&self, filename: &str) -> Result<(PathBuf, u64), BackupError> {
        let path = self.resolve(filename)?;
        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => {
                let size = metadata.len();
                Ok((path, size))
            }
            Ok(_) => Err(BackupError::NotFound),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BackupError::NotFound),
            Err(e) => Err(BackupError::StorageWriteFailed(e)),
        }
    }

    fn resolve(&self, filename: &str) -> Result<PathBuf, BackupError> {
        sanitize(filename)?;
        Ok(self.root.join(filename))
    }
}

/// Rejects names that could escape the store directory or touch the
/// protection marker, before any filesystem access.
fn sanitize(filename: &str) -> Result<(), BackupError> {
    if filename.is_empty()
        || filename == PROTECT_MARKER
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
        || filename.contains('\0')
        || !filename.ends_with(BACKUP_SUFFIX)
    {
        return Err(BackupError::InvalidFilename);
    }
    Ok(())
}
