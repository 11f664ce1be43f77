use thiserror::Error;

/// Failures surfaced to the request layer. Every variant renders a
/// human-readable message; driver and I/O details ride along as sources
/// for logging only and are never shown to users.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("could not connect to the database")]
    ConnectionFailed(#[source] sqlx::Error),

    #[error("could not list the database tables")]
    EnumerationFailed(#[source] sqlx::Error),

    #[error("failed to read table `{table}`")]
    TableReadFailed {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("mysqldump was found but failed to produce a backup")]
    ExternalToolFailed,

    #[error("could not write to the backup directory")]
    StorageWriteFailed(#[source] std::io::Error),

    #[error("backup file not found")]
    NotFound,

    #[error("invalid backup filename")]
    InvalidFilename,

    #[error("you do not have permission to perform this action")]
    PermissionDenied,

    #[error("the backup was cancelled")]
    Cancelled,
}
