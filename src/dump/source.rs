use async_trait::async_trait;
use log::debug;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{Executor, MySqlPool, Row};

use crate::config::DatabaseConfig;
use crate::dump::escape::quote_identifier;
use crate::error::BackupError;

/// One row of raw column values, in column-ordinal order. `None` is SQL NULL.
pub type DumpRow = Vec<Option<Vec<u8>>>;

/// Read-side abstraction the dumper works against, so the dump logic can be
/// exercised without a live server.
#[async_trait]
pub trait DumpSource: Send + Sync {
    /// Table names in whatever order the database returns them.
    async fn list_tables(&self) -> Result<Vec<String>, sqlx::Error>;

    /// The canonical `CREATE TABLE` statement for one table.
    async fn create_statement(&self, table: &str) -> Result<String, sqlx::Error>;

    /// All rows of one table in database-default scan order.
    async fn table_rows(&self, table: &str) -> Result<Vec<DumpRow>, sqlx::Error>;
}

/// Connects a [`DumpSource`] on demand. Injected into the service so tests
/// can substitute an in-memory source.
#[async_trait]
pub trait DumpSourceFactory: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn DumpSource>, BackupError>;
}

pub struct MySqlSource {
    pool: MySqlPool,
}

impl MySqlSource {
    pub async fn connect(config: &DatabaseConfig) -> Result<MySqlSource, BackupError> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(&config.password)
            .database(&config.database);

        debug!("Connecting to {}:{}/{}", config.host, config.port, config.database);
        let pool = MySqlPool::connect_with(options)
            .await
            .map_err(BackupError::ConnectionFailed)?;
        Ok(MySqlSource { pool })
    }
}

// Queries run unprepared so the server answers over the text protocol and
// every column value arrives as its textual bytes, whatever the column type.
#[async_trait]
impl DumpSource for MySqlSource {
    async fn list_tables(&self) -> Result<Vec<String>, sqlx::Error> {
        let rows = self.pool.fetch_all("SHOW TABLES").await?;
        rows.iter()
            .map(|row| row.try_get_unchecked::<String, _>(0))
            .collect()
    }

    async fn create_statement(&self, table: &str) -> Result<String, sqlx::Error> {
        let sql = format!("SHOW CREATE TABLE {}", quote_identifier(table));
        let row = self.pool.fetch_one(sql.as_str()).await?;
        // Column 0 is the table name, column 1 the statement.
        row.try_get_unchecked::<String, _>(1)
    }

    async fn table_rows(&self, table: &str) -> Result<Vec<DumpRow>, sqlx::Error> {
        let sql = format!("SELECT * FROM {}", quote_identifier(table));
        let rows = self.pool.fetch_all(sql.as_str()).await?;
        rows.iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| row.try_get_unchecked::<Option<Vec<u8>>, _>(i))
                    .collect()
            })
            .collect()
    }
}

pub struct MySqlSourceFactory {
    config: DatabaseConfig,
}

impl MySqlSourceFactory {
    pub fn new(config: DatabaseConfig) -> MySqlSourceFactory {
        MySqlSourceFactory { config }
    }
}

#[async_trait]
impl DumpSourceFactory for MySqlSourceFactory {
    async fn connect(&self) -> Result<Box<dyn DumpSource>, BackupError> {
        let source = MySqlSource::connect(&self.config).await?;
        Ok(Box::new(source))
    }
}
