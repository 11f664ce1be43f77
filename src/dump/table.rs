use log::debug;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::dump::escape::{quote_identifier, serialize_value};
use crate::dump::source::DumpSource;
use crate::error::BackupError;

/// Writes one table section: the idempotent structure definition followed by
/// one positional INSERT per row. Any read error aborts the table whole, so
/// a data section can never appear without its structure.
pub async fn dump_table<W>(
    source: &dyn DumpSource,
    table: &str,
    sink: &mut W,
) -> Result<(), BackupError>
where
    W: AsyncWrite + Unpin + Send,
{
    let read_err = |source| BackupError::TableReadFailed {
        table: table.to_string(),
        source,
    };

    debug!("Dumping table: {}", table);
    let create = source.create_statement(table).await.map_err(read_err)?;
    let ident = quote_identifier(table);

    let mut section = Vec::new();
    section.extend_from_slice(format!("-- Table structure for table {}\n", ident).as_bytes());
    section.extend_from_slice(format!("DROP TABLE IF EXISTS {};\n", ident).as_bytes());
    section.extend_from_slice(create.as_bytes());
    section.extend_from_slice(b";\n\n");
    section.extend_from_slice(format!("-- Dumping data for table {}\n", ident).as_bytes());
    sink.write_all(&section)
        .await
        .map_err(BackupError::StorageWriteFailed)?;

    let rows = source.table_rows(table).await.map_err(read_err)?;
    let mut statement = Vec::new();
    for row in &rows {
        statement.clear();
        statement.extend_from_slice(format!("INSERT INTO {} VALUES (", ident).as_bytes());
        for (i, value) in row.iter().enumerate() {
            if i > 0 {
                statement.push(b',');
            }
            serialize_value(value.as_deref(), &mut statement);
        }
        statement.extend_from_slice(b");\n");
        sink.write_all(&statement)
            .await
            .map_err(BackupError::StorageWriteFailed)?;
    }

    sink.write_all(b"\n\n")
        .await
        .map_err(BackupError::StorageWriteFailed)?;
    debug!("-> {} rows", rows.len());
    Ok(())
}
