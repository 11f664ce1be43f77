use std::path::PathBuf;
use std::sync::Arc;

use log::info;
use serde::Serialize;
use tempfile::NamedTempFile;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, DatabaseConfig};
use crate::dump::dump_database;
use crate::dump::mysqldump::{MysqldumpTool, ToolOutcome};
use crate::dump::source::{DumpSourceFactory, MySqlSourceFactory};
use crate::error::BackupError;
use crate::store::{BackupRecord, BackupStore};
use crate::tokens::SaltedTokenProvider;

#[derive(Debug, Serialize)]
pub struct CreatePayload {
    pub message: String,
    pub backups: Vec<BackupRecord>,
}

#[derive(Debug, Serialize)]
pub struct DeletePayload {
    pub message: String,
    pub backups: Vec<BackupRecord>,
}

/// Everything the request layer needs to frame a file-attachment response.
#[derive(Debug, Serialize)]
pub struct DownloadPayload {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
}

/// The backup facade the request layer talks to. Constructed once per process
/// with its collaborators injected; holds no mutable state of its own.
/// Authentication and anti-forgery checks are the caller's responsibility.
pub struct BackupService {
    database: DatabaseConfig,
    store: BackupStore,
    sources: Arc<dyn DumpSourceFactory>,
    tool: MysqldumpTool,
    clock: Arc<dyn Clock>,
}

impl BackupService {
    /// Construction initializes the store, so the backup directory carries
    /// its protection marker before any request is served — including a
    /// pre-existing directory whose marker went missing.
    pub fn new(
        database: DatabaseConfig,
        store: BackupStore,
        sources: Arc<dyn DumpSourceFactory>,
        tool: MysqldumpTool,
        clock: Arc<dyn Clock>,
    ) -> Result<BackupService, BackupError> {
        store.init()?;
        Ok(BackupService {
            database,
            store,
            sources,
            tool,
            clock,
        })
    }

    /// Wires the production collaborators from configuration.
    pub fn from_config(config: &Config) -> Result<BackupService, BackupError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = BackupStore::new(
            &config.backup.basedir,
            Arc::clone(&clock),
            Arc::new(SaltedTokenProvider::new(config.backup.token_salt.clone())),
        );
        BackupService::new(
            config.database.clone(),
            store,
            Arc::new(MySqlSourceFactory::new(config.database.clone())),
            MysqldumpTool::new(),
            clock,
        )
    }

    /// Dumps the database into a staged file and promotes it to a completed
    /// backup. The external tool is tried first; the built-in dumper only
    /// runs when no tool is available. A failed tool invocation is terminal,
    /// and nothing is committed unless the dump finished whole.
    pub async fn create_backup(
        &self,
        cancel: &CancellationToken,
    ) -> Result<CreatePayload, BackupError> {
        let staged = self.store.stage()?;

        match self.tool.run(&self.database, staged.path(), cancel).await? {
            ToolOutcome::Ran => {
                info!("Created backup of {} with mysqldump", self.database.database);
            }
            ToolOutcome::Unavailable => {
                self.dump_with_builtin(&staged, cancel).await?;
                info!("Created backup of {} with the built-in dumper", self.database.database);
            }
        }

        let record = self.store.commit(staged, &self.database.database)?;
        info!("Backup stored as {}", record.filename);

        Ok(CreatePayload {
            message: "Backup created successfully!".to_string(),
            backups: self.store.list()?,
        })
    }

    async fn dump_with_builtin(
        &self,
        staged: &NamedTempFile,
        cancel: &CancellationToken,
    ) -> Result<(), BackupError> {
        let source = self.sources.connect().await?;
        let file = staged.reopen().map_err(BackupError::StorageWriteFailed)?;
        let mut sink = BufWriter::new(tokio::fs::File::from_std(file));
        dump_database(
            source.as_ref(),
            &self.database.database,
            self.clock.now(),
            &mut sink,
            cancel,
        )
        .await?;
        sink.flush().await.map_err(BackupError::StorageWriteFailed)
    }

    pub fn delete_backup(&self, filename: &str) -> Result<DeletePayload, BackupError> {
        self.store.delete(filename)?;
        Ok(DeletePayload {
            message: "Backup deleted successfully!".to_string(),
            backups: self.store.list()?,
        })
    }

    pub fn list_backups(&self) -> Result<Vec<BackupRecord>, BackupError> {
        self.store.list()
    }

    pub fn download_backup(&self, filename: &str) -> Result<DownloadPayload, BackupError> {
        let (path, size_bytes) = self.store.download(filename)?;
        Ok(DownloadPayload {
            file_name: filename.to_string(),
            size_bytes,
            path,
        })
    }
}
